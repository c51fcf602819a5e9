pub mod appointment;
pub mod enums;
pub mod filters;
pub mod identity;
pub mod medical_record;
pub mod patient;
pub mod service;
pub mod staff;
pub mod test_result;

pub use appointment::*;
pub use filters::*;
pub use identity::*;
pub use medical_record::*;
pub use patient::*;
pub use service::*;
pub use staff::*;
pub use test_result::*;
