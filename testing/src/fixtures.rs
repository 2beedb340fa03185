//! Shared test fixtures: the product catalog domain.
//!
//! A small but realistic aggregate used by the workspace's integration
//! tests: products are created, then accumulate variants and content
//! documents. The command handlers run the full repository discipline
//! (load or create, record, save) with snapshotting enabled, the way a
//! production command surface would.

use replay_core::aggregate::Aggregate;
use replay_core::command::{CommandError, CommandHandler};
use replay_core::environment::Clock;
use replay_core::event::{BincodeCodec, Event};
use replay_core::log::EventLog;
use replay_core::naming::StreamNamer;
use replay_core::repository::Repository;
use replay_core::snapshot::{SnapshotPolicy, SnapshotReader, Snapshotter};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Events in a product's history.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum ProductEvent {
    /// The product came into existence.
    Created {
        /// The product identifier.
        product_id: String,
    },
    /// A sellable variant was added.
    VariantAdded {
        /// The variant identifier.
        variant_id: String,
    },
    /// A content document was attached.
    ContentAdded {
        /// The content identifier.
        content_id: String,
    },
}

impl Event for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::Created { .. } => "ProductCreated.v1",
            ProductEvent::VariantAdded { .. } => "VariantAddedToProduct.v1",
            ProductEvent::ContentAdded { .. } => "ContentAddedToProduct.v1",
        }
    }
}

/// A product: identifier plus its variants and contents.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Product {
    /// The product identifier, set by [`ProductEvent::Created`].
    pub product_id: String,
    /// Variant identifiers, in creation order.
    pub variants: Vec<String>,
    /// Content identifiers, in creation order.
    pub contents: Vec<String>,
}

impl Aggregate for Product {
    const TYPE_NAME: &'static str = "Product";
    type Event = ProductEvent;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProductEvent::Created { product_id } => {
                self.product_id.clone_from(product_id);
            }
            ProductEvent::VariantAdded { variant_id } => {
                self.variants.push(variant_id.clone());
            }
            ProductEvent::ContentAdded { content_id } => {
                self.contents.push(content_id.clone());
            }
        }
    }
}

/// Command: bring a new product into existence.
#[derive(Clone, Debug)]
pub struct CreateProduct {
    /// Identifier for the new product.
    pub product_id: String,
}

/// Command: add a variant to an existing product.
#[derive(Clone, Debug)]
pub struct AddVariantToProduct {
    /// The product to modify.
    pub product_id: String,
    /// The variant to add.
    pub variant_id: String,
}

/// Command: attach a content document to an existing product.
#[derive(Clone, Debug)]
pub struct AddContentToProduct {
    /// The product to modify.
    pub product_id: String,
    /// The content to attach.
    pub content_id: String,
}

/// Handlers for all product commands.
///
/// Builds a fresh repository (and unit of work) per command, mirroring
/// the one-operation scope the repository is designed for.
#[derive(Clone)]
pub struct ProductCommandHandlers {
    log: Arc<dyn EventLog>,
    clock: Arc<dyn Clock>,
    snapshot_interval: u64,
}

impl ProductCommandHandlers {
    /// Create handlers over the given log and clock, snapshotting every
    /// `snapshot_interval` events.
    #[must_use]
    pub fn new(log: Arc<dyn EventLog>, clock: Arc<dyn Clock>, snapshot_interval: u64) -> Self {
        Self {
            log,
            clock,
            snapshot_interval,
        }
    }

    /// A fully wired product repository for one operation.
    #[must_use]
    pub fn repository(&self) -> Repository<Product> {
        let namer = StreamNamer::new(Product::TYPE_NAME);
        Repository::new(self.log.clone(), Arc::new(BincodeCodec))
            .with_snapshots(SnapshotReader::new(self.log.clone(), namer))
            .with_snapshotter(Snapshotter::new(
                self.log.clone(),
                namer,
                SnapshotPolicy::every(self.snapshot_interval),
                self.clock.clone(),
            ))
    }
}

impl CommandHandler<CreateProduct> for ProductCommandHandlers {
    fn handle(
        &self,
        command: CreateProduct,
    ) -> Pin<Box<dyn Future<Output = Result<(), CommandError>> + Send + '_>> {
        Box::pin(async move {
            let mut repository = self.repository();
            let product = repository.create(&command.product_id, Product::default())?;
            product.record(ProductEvent::Created {
                product_id: command.product_id,
            });
            repository.save().await?;
            Ok(())
        })
    }
}

impl CommandHandler<AddVariantToProduct> for ProductCommandHandlers {
    fn handle(
        &self,
        command: AddVariantToProduct,
    ) -> Pin<Box<dyn Future<Output = Result<(), CommandError>> + Send + '_>> {
        Box::pin(async move {
            let mut repository = self.repository();
            let product = repository.load(&command.product_id).await?;
            if product.state().variants.contains(&command.variant_id) {
                return Err(CommandError::Rejected(format!(
                    "variant {} already exists",
                    command.variant_id
                )));
            }
            product.record(ProductEvent::VariantAdded {
                variant_id: command.variant_id,
            });
            repository.save().await?;
            Ok(())
        })
    }
}

impl CommandHandler<AddContentToProduct> for ProductCommandHandlers {
    fn handle(
        &self,
        command: AddContentToProduct,
    ) -> Pin<Box<dyn Future<Output = Result<(), CommandError>> + Send + '_>> {
        Box::pin(async move {
            let mut repository = self.repository();
            let product = repository.load(&command.product_id).await?;
            product.record(ProductEvent::ContentAdded {
                content_id: command.content_id,
            });
            repository.save().await?;
            Ok(())
        })
    }
}
