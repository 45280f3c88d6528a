pub mod book;
pub mod copy;
pub mod fine;
pub mod hold;
pub mod loan;
pub mod pickup_request;
pub mod pickup_request_item;
pub mod policy;
pub mod user;
