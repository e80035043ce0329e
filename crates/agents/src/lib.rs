//! Agent runtime: the action registry, the completion engine gateway and the
//! turn controller that drives one request/response exchange.

pub mod action;
pub mod action_registry;
pub mod completion;
pub mod providers;
pub mod turn;

pub use {
    action::{ActionArgs, ActionRequest, ActionResult},
    action_registry::{ActionHandler, ActionRegistry, ParamKind, ParamSpec},
    completion::{CompletionGateway, RunId, RunSnapshot, RunStatus},
    turn::{TurnConfig, TurnController, TurnError, TurnOutcome},
};
