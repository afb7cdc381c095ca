//! Stage-by-stage seeding run.
//!
//! Stages run in a fixed dependency order. Each one is generated in memory
//! against a scratch copy of the [`ReferenceIndex`], written inside a single
//! transaction, and only then becomes visible to later stages. A stage whose
//! inputs are missing is skipped; every other failure rolls the stage back and
//! ends the run.

use std::collections::BTreeMap;
use std::fmt;

use chrono::Utc;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::SeedConfig;
use crate::entities::user::Role;
use crate::entities::EntityKind;
use crate::error::{RunError, SeedError};
use crate::factory::{address, basket, catalog, order, social, user};
use crate::index::ReferenceIndex;
use crate::sink::{Batch, SeedSink};
use crate::synth::{Synthesizer, ValueSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Users,
    RoleAssignment,
    Friendships,
    PhoneRecords,
    Addresses,
    Catalog,
    Baskets,
    Orders,
}

impl Stage {
    pub const ORDER: [Stage; 8] = [
        Stage::Users,
        Stage::RoleAssignment,
        Stage::Friendships,
        Stage::PhoneRecords,
        Stage::Addresses,
        Stage::Catalog,
        Stage::Baskets,
        Stage::Orders,
    ];

    /// Whether a missing input population turns this stage into a no-op
    /// instead of failing the run. Seller/buyer counts are exact, so the user
    /// stages never degrade.
    pub fn degrades(self) -> bool {
        !matches!(self, Stage::Users | Stage::RoleAssignment)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Users => "users",
            Stage::RoleAssignment => "role_assignment",
            Stage::Friendships => "friendships",
            Stage::PhoneRecords => "phone_records",
            Stage::Addresses => "addresses",
            Stage::Catalog => "catalog",
            Stage::Baskets => "baskets",
            Stage::Orders => "orders",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageStatus {
    Committed,
    Skipped { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    #[serde(flatten)]
    pub status: StageStatus,
    /// Rows written per entity kind.
    pub rows: BTreeMap<EntityKind, u64>,
}

impl StageReport {
    pub fn rows_of(&self, kind: EntityKind) -> u64 {
        self.rows.get(&kind).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Replaying with `SEED_RNG` set to this value reproduces the run.
    pub seed: u64,
    pub stages: Vec<StageReport>,
    /// Row count per table after the run, read back from the store.
    pub stored: BTreeMap<EntityKind, u64>,
}

impl RunReport {
    pub fn stage(&self, stage: Stage) -> Option<&StageReport> {
        self.stages.iter().find(|report| report.stage == stage)
    }
}

/// Everything one stage wants written.
#[derive(Debug, Default)]
struct StagePlan {
    roles: Vec<(i32, Role)>,
    batches: Vec<Batch>,
}

impl StagePlan {
    fn of(batches: Vec<Batch>) -> Self {
        StagePlan {
            roles: Vec::new(),
            batches,
        }
    }
}

pub struct SeedingPipeline<S: SeedSink> {
    config: SeedConfig,
    sink: S,
    synth: Synthesizer,
    index: ReferenceIndex,
    seed: u64,
}

impl<S: SeedSink> SeedingPipeline<S> {
    pub fn new(config: SeedConfig, sink: S, source: Box<dyn ValueSource>) -> Self {
        let seed = config.rng_seed.unwrap_or_else(rand::random);
        let synth = Synthesizer::new(
            ChaCha8Rng::seed_from_u64(seed),
            source,
            Utc::now().naive_utc(),
        );
        Self {
            config,
            sink,
            synth,
            index: ReferenceIndex::new(),
            seed,
        }
    }

    pub fn index(&self) -> &ReferenceIndex {
        &self.index
    }

    pub async fn run(&mut self) -> Result<RunReport, RunError> {
        info!(seed = self.seed, "seeding started");
        let mut completed = Vec::new();

        if let Err(source) = self.prepare().await {
            return Err(RunError {
                stage: Stage::Users,
                source,
                completed,
            });
        }

        for stage in Stage::ORDER {
            let mut scratch = self.index.clone();
            let plan = match self.generate(stage, &mut scratch) {
                Ok(plan) => plan,
                Err(SeedError::InsufficientPopulation {
                    population,
                    requested,
                    available,
                }) if stage.degrades() => {
                    let reason = format!(
                        "needs {requested} {population}, found {available}"
                    );
                    warn!(stage = %stage, %reason, "stage skipped");
                    completed.push(StageReport {
                        stage,
                        status: StageStatus::Skipped { reason },
                        rows: BTreeMap::new(),
                    });
                    continue;
                }
                Err(source) => {
                    error!(stage = %stage, error = %source, "stage generation failed");
                    return Err(RunError {
                        stage,
                        source,
                        completed,
                    });
                }
            };

            match self.persist(plan).await {
                Ok(rows) => {
                    self.index = scratch;
                    for (kind, count) in &rows {
                        info!(stage = %stage, entity = %kind, rows = count, "stage committed");
                    }
                    completed.push(StageReport {
                        stage,
                        status: StageStatus::Committed,
                        rows,
                    });
                }
                Err(source) => {
                    error!(stage = %stage, error = %source, "stage rolled back");
                    return Err(RunError {
                        stage,
                        source,
                        completed,
                    });
                }
            }
        }

        let stored = self.stored_counts().await;
        info!(seed = self.seed, stages = completed.len(), "seeding finished");
        Ok(RunReport {
            seed: self.seed,
            stages: completed,
            stored,
        })
    }

    /// Validates the configuration, drops whatever an earlier run left in the
    /// index and continues key allocation after what the store already holds.
    async fn prepare(&mut self) -> Result<(), SeedError> {
        self.config.check()?;
        self.index = ReferenceIndex::new();
        self.synth.forget_distinct();
        for kind in EntityKind::ALL {
            let max = self.sink.max_id(kind).await?;
            self.index.reserve_ids(kind, max);
        }
        Ok(())
    }

    fn generate(&mut self, stage: Stage, index: &mut ReferenceIndex) -> Result<StagePlan, SeedError> {
        let synth = &mut self.synth;
        let config = &self.config;
        let plan = match stage {
            Stage::Users => {
                let mut users = Vec::with_capacity(config.users);
                for _ in 0..config.users {
                    users.push(user::build_user(synth, index, config.retry_cap)?.register(index));
                }
                StagePlan::of(vec![Batch::Users(users)])
            }
            Stage::RoleAssignment => {
                let assignment = user::assign_roles(synth, index, config)?;
                StagePlan {
                    roles: assignment.updates,
                    batches: vec![
                        Batch::Buyers(assignment.buyers),
                        Batch::Sellers(assignment.sellers),
                    ],
                }
            }
            Stage::Friendships => StagePlan::of(vec![Batch::Friendships(
                social::build_friendships(synth, index, config),
            )]),
            Stage::PhoneRecords => {
                StagePlan::of(vec![Batch::Phones(social::build_phones(synth, index, config)?)])
            }
            Stage::Addresses => StagePlan::of(vec![Batch::Addresses(address::build_addresses(
                synth, index, config,
            )?)]),
            Stage::Catalog => {
                let catalog = catalog::build_catalog(synth, index, config)?;
                StagePlan::of(vec![
                    Batch::Products(catalog.products),
                    Batch::Variants(catalog.variants),
                    Batch::Tags(catalog.tags),
                    Batch::Images(catalog.images),
                ])
            }
            Stage::Baskets => {
                let baskets = basket::build_baskets(synth, index, config)?;
                StagePlan::of(vec![
                    Batch::CartItems(baskets.cart),
                    Batch::WishlistItems(baskets.wishlist),
                ])
            }
            Stage::Orders => {
                let orders = order::build_orders(synth, index, config)?;
                StagePlan::of(vec![
                    Batch::Orders(orders.orders),
                    Batch::OrderLines(orders.lines),
                    Batch::Reviews(orders.reviews),
                ])
            }
        };
        Ok(plan)
    }

    /// Writes a plan in one transaction, rolling back on the first failure.
    async fn persist(&mut self, plan: StagePlan) -> Result<BTreeMap<EntityKind, u64>, SeedError> {
        self.sink.begin().await?;
        match self.write(plan).await {
            Ok(rows) => {
                self.sink.commit().await?;
                Ok(rows)
            }
            Err(err) => {
                if let Err(rollback) = self.sink.rollback().await {
                    error!(error = %rollback, "rollback failed");
                }
                Err(err)
            }
        }
    }

    async fn write(&mut self, plan: StagePlan) -> Result<BTreeMap<EntityKind, u64>, SeedError> {
        if !plan.roles.is_empty() {
            self.sink.assign_roles(&plan.roles).await?;
        }
        let mut rows = BTreeMap::new();
        for batch in plan.batches {
            let kind = batch.kind();
            let written = self.sink.bulk_insert(batch).await?;
            *rows.entry(kind).or_insert(0) += written;
        }
        Ok(rows)
    }

    async fn stored_counts(&mut self) -> BTreeMap<EntityKind, u64> {
        let mut stored = BTreeMap::new();
        for kind in EntityKind::ALL {
            match self.sink.count(kind).await {
                Ok(count) => {
                    stored.insert(kind, count);
                }
                Err(err) => warn!(entity = %kind, error = %err, "could not count rows"),
            }
        }
        stored
    }
}
