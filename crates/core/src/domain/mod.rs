pub mod conversation;
pub mod customer;
pub mod flow;
pub mod item;
pub mod money;
pub mod phone;
