//! Request pipeline: validation, response assembly and the orchestrating service.

mod assembler;
mod rest;
mod validation;

pub use assembler::{
    Assembly, ResponseAssembler, SelectedMapping, HEADER_CACHE_CONTROL, HEADER_ETAG, HEADER_EXPIRES,
    HEADER_LAST_MODIFIED, HEADER_TOTAL_COUNT,
};
pub use rest::{RestService, PARAM_MAPPER};
pub use validation::{Rejection, RejectionKind, RequestValidator, ValidationOutcome};
