pub mod contacts;
pub mod patients;
pub mod readings;

pub use contacts::NewContact;
