use sea_orm::{QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    PaymentTermStage, PaymentTermTemplate, ResultSettlement, SettlementError, payment_term_stages,
    payment_terms, util::parse_uuid,
};

use super::{Engine, with_tx};

impl Engine {
    /// Stores a payment term template with its stages, in order.
    pub async fn new_payment_term(
        &self,
        name: &str,
        stages: Vec<PaymentTermStage>,
    ) -> ResultSettlement<Uuid> {
        let template = PaymentTermTemplate::new(name, stages)?;
        if !template.is_balanced() {
            tracing::warn!(
                name = %template.name,
                total = %template.total_percentage(),
                "payment term stages do not add up to 100%"
            );
        }
        with_tx!(self, |db_tx| {
            payment_terms::ActiveModel::from(&template)
                .insert(&db_tx)
                .await?;
            for (position, stage) in template.stages.iter().enumerate() {
                let position = i32::try_from(position + 1).map_err(|_| {
                    SettlementError::InvalidAmount("too many payment term stages".to_string())
                })?;
                payment_term_stages::ActiveModel::from_stage(template.id, position, stage)?
                    .insert(&db_tx)
                    .await?;
            }
            tracing::info!(id = %template.id, name = %template.name, "payment term created");
            Ok(template.id)
        })
    }

    /// Loads a template with its stages in position order.
    pub async fn payment_term(&self, id: Uuid) -> ResultSettlement<PaymentTermTemplate> {
        with_tx!(self, |db_tx| {
            let model = payment_terms::Entity::find_by_id(id.to_string())
                .one(&db_tx)
                .await?
                .ok_or_else(|| SettlementError::KeyNotFound(format!("payment term {id}")))?;
            let stages = payment_term_stages::Entity::find()
                .filter(payment_term_stages::Column::PaymentTermId.eq(model.id.clone()))
                .order_by_asc(payment_term_stages::Column::Position)
                .all(&db_tx)
                .await?
                .into_iter()
                .map(PaymentTermStage::try_from)
                .collect::<ResultSettlement<Vec<_>>>()?;
            Ok(PaymentTermTemplate {
                id: parse_uuid(&model.id, "payment term")?,
                name: model.name,
                stages,
            })
        })
    }
}
