//! Per-request behaviour flags and the body validator.

use super::validator::RequestValidator;

/// Flags that change how a request is performed or returned.
///
/// Invariants:
/// - `perform` starts `true` and only becomes `false` through
///   [`mark_invalid`](Self::mark_invalid), which the pipeline calls when the
///   body fails validation. A request with `perform == false` is never sent.
/// - An `authenticating` request is the token request itself and must not
///   trigger a nested token refresh. The client checks the flag before its
///   401 retry; token requests also bypass that path entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestBehavior {
    expand_result: bool,
    container: bool,
    authenticating: bool,
    perform: bool,
    validator: RequestValidator,
}

impl Default for RequestBehavior {
    fn default() -> Self {
        RequestBehavior {
            expand_result: false,
            container: false,
            authenticating: false,
            perform: true,
            validator: RequestValidator::default(),
        }
    }
}

impl RequestBehavior {
    pub fn new(
        expand_result: bool,
        container: bool,
        authenticating: bool,
        perform: bool,
        validator: RequestValidator,
    ) -> Self {
        RequestBehavior {
            expand_result,
            container,
            authenticating,
            perform,
            validator,
        }
    }

    /// Return the legacy `(status, headers, body)` tuple instead of an object.
    pub fn expand_result(&self) -> bool {
        self.expand_result
    }

    /// Targets a container-registry endpoint.
    pub fn container(&self) -> bool {
        self.container
    }

    pub fn authenticating(&self) -> bool {
        self.authenticating
    }

    pub fn perform(&self) -> bool {
        self.perform
    }

    pub fn validator(&self) -> &RequestValidator {
        &self.validator
    }

    /// Blocks the network call after a failed validation.
    pub fn mark_invalid(&mut self) {
        self.perform = false;
    }
}
