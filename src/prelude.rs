//! Rebate prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    admin::{CampaignsService, CampaignsServiceError, StoreCampaignsService},
    campaigns::{
        Campaign, CampaignStatus, CampaignTransition, CampaignUpdate, NewCampaign,
        ReversalOutcome,
        budget::{CampaignBudget, CustomerUsageAggregate},
        errors::{CampaignError, ValidationError},
    },
    config::{BudgetEnforcement, EngineConfig, LogFormat, LoggingConfig, Rounding},
    fixtures::{Catalogue, Fixture, FixtureError},
    ids::{
        BrandUuid, CampaignUuid, CategoryUuid, CustomerUuid, OrderItemUuid, OrderUuid,
        ProductUuid, RuleUuid, TypedUuid, UsageUuid,
    },
    money::{Money, MoneyError},
    recording::{
        RecordingService, ReversalSummary, UsageRecordingService, UsageRequest, UsageServiceError,
    },
    rules::{
        Discount, DiscountRule, DiscountType, NewDiscountRule,
        targeting::{
            CustomerTargetType, CustomerTier, ProductContext, ProductTargetType, RuleTarget,
        },
    },
    selection::{
        DiscountCandidate, DiscountSelectionService, QuoteError, QuoteRequest, SelectionService,
    },
    store::{CampaignStore, InMemoryCampaignStore, StoreError, UnitOfWork},
    usage::CampaignUsage,
};
