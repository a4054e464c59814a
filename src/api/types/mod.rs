pub mod request;
pub mod response;

pub use request::ChangesRequest;
pub use response::ApiResponse;
