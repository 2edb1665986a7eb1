//! Client core for Blockopoly: reads game state from the indexer gateway,
//! reconciles it into board view-models and submits guarded player actions.

pub mod board;

pub mod config;

pub mod dispatch;

pub mod error;

pub mod indexer_client;

pub mod poll;

pub mod reconcile;

pub mod remote;

pub mod route;

pub mod session;

pub mod store;

pub mod sync;

pub mod test_helpers;

pub mod types;

pub use error::{
    Error,
    Result,
};
pub use remote::RemoteStateClient;
