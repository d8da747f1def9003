use crate::db::{DbPool, OrmConn};
use crate::gateway::RefundClient;

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub refund: RefundClient,
}
