//! Infrastructure layer - database connection, session and unit of work.

mod db;
pub mod session;
pub mod unit_of_work;

pub use db::Database;
pub use session::{Session, SessionHandle};
pub use unit_of_work::{Persistence, TransactionScope, UnitOfWork};
