//! Explicit command dispatch.
//!
//! Commands reach their handlers through a [`Dispatcher`] that is built
//! once per process and handed to the surface that receives commands.
//! There is no ambient bus and no hidden registration step: a handler
//! handles a command type because someone called
//! [`register`](Dispatcher::register) on this dispatcher, and nothing
//! else.
//!
//! A typical handler runs the repository discipline end to end: load (or
//! create), apply domain logic, save.

use crate::repository::RepositoryError;
use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

/// Failure inside a command handler.
#[derive(Error, Debug)]
pub enum CommandError {
    /// The repository rejected the load or save.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Domain logic rejected the command.
    #[error("Command rejected: {0}")]
    Rejected(String),
}

/// Failure routing or executing a command.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// No handler is registered for this command type.
    #[error("No handler registered for command {0}")]
    NoHandler(&'static str),

    /// The handler ran and failed.
    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Handles one command type.
///
/// # Dyn compatibility
///
/// Boxed futures keep handlers storable as `Arc<dyn CommandHandler<C>>`
/// inside the dispatcher's registry.
pub trait CommandHandler<C>: Send + Sync {
    /// Execute the command.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] when the command is rejected by domain
    /// logic or fails in the repository.
    fn handle(
        &self,
        command: C,
    ) -> Pin<Box<dyn Future<Output = Result<(), CommandError>> + Send + '_>>;
}

/// Registry mapping command types to their handlers.
///
/// Each command type has at most one handler; registering a second
/// replaces the first. The dispatcher is cheap to construct and intended
/// to be built once at process startup with every handler in view.
///
/// # Examples
///
/// ```ignore
/// let mut dispatcher = Dispatcher::new();
/// dispatcher.register::<CreateProduct>(Arc::new(product_handlers.clone()));
/// dispatcher.register::<AddVariantToProduct>(Arc::new(product_handlers));
///
/// dispatcher.dispatch(CreateProduct { product_id: "42".into() }).await?;
/// ```
#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Dispatcher {
    /// Create an empty dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register the handler for command type `C`.
    pub fn register<C: Send + 'static>(&mut self, handler: Arc<dyn CommandHandler<C>>) {
        self.handlers.insert(TypeId::of::<C>(), Box::new(handler));
    }

    /// Whether a handler is registered for command type `C`.
    #[must_use]
    pub fn handles<C: Send + 'static>(&self) -> bool {
        self.handlers.contains_key(&TypeId::of::<C>())
    }

    /// Route a command to its handler and execute it.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::NoHandler`] when no handler is registered for
    ///   the command's type.
    /// - [`DispatchError::Command`] when the handler fails.
    pub async fn dispatch<C: Send + 'static>(&self, command: C) -> Result<(), DispatchError> {
        let handler = self
            .handlers
            .get(&TypeId::of::<C>())
            .and_then(|entry| entry.downcast_ref::<Arc<dyn CommandHandler<C>>>())
            .ok_or_else(|| DispatchError::NoHandler(type_name::<C>()))?;
        handler.handle(command).await?;
        Ok(())
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registered", &self.handlers.len())
            .finish()
    }
}
