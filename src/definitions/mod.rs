pub mod request;
pub mod response;
pub mod status;
pub mod x509;

pub use request::{AuthRequest, RequestError, UserLanguage};
pub use response::{AuthResponse, ServiceExtension, SignerSummary};
pub use status::{Status, StatusCode, StatusColor};
