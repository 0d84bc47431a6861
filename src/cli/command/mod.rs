pub mod aggregate;
pub mod convert;
pub mod fetch;

pub use aggregate::aggregate;
pub use convert::convert;
pub use fetch::fetch;
