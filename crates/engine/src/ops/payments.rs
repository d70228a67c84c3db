use sea_orm::{ActiveValue, QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    Allocation, NewPayment, Payment, PaymentStatus, ResultSettlement, SettlementError,
    allocations, payments,
};

use super::{Engine, helpers::Lock, with_tx};

impl Engine {
    /// Records a wire transfer, pending approval.
    pub async fn record_payment(&self, input: &NewPayment<'_>) -> ResultSettlement<Uuid> {
        let payment = Payment::new(input)?;
        with_tx!(self, |db_tx| {
            let currency = self.require_currency(&db_tx, payment.currency).await?;
            if !currency.active {
                return Err(SettlementError::Precondition(format!(
                    "currency {} is inactive",
                    currency.code
                )));
            }
            payments::ActiveModel::from(&payment).insert(&db_tx).await?;
            tracing::info!(
                id = %payment.id,
                direction = payment.direction.as_str(),
                amount = %payment.amount,
                currency = %payment.currency,
                "payment recorded"
            );
            Ok(payment.id)
        })
    }

    /// PENDING_APPROVAL -> APPROVED.
    pub async fn approve_payment(&self, payment_id: Uuid) -> ResultSettlement<()> {
        self.decide_payment(payment_id, PaymentStatus::Approved)
            .await
    }

    /// PENDING_APPROVAL -> REJECTED. A payment with allocations cannot be
    /// rejected.
    pub async fn reject_payment(&self, payment_id: Uuid) -> ResultSettlement<()> {
        self.decide_payment(payment_id, PaymentStatus::Rejected)
            .await
    }

    async fn decide_payment(&self, payment_id: Uuid, status: PaymentStatus) -> ResultSettlement<()> {
        with_tx!(self, |db_tx| {
            let payment = self
                .require_payment(&db_tx, payment_id, Lock::Exclusive)
                .await?;
            if payment.status != PaymentStatus::PendingApproval {
                return Err(SettlementError::Precondition(format!(
                    "payment {payment_id} is already {}",
                    payment.status.as_str()
                )));
            }
            if status == PaymentStatus::Rejected && !payment.allocated.is_zero() {
                return Err(SettlementError::Precondition(format!(
                    "payment {payment_id} has allocations and cannot be rejected"
                )));
            }
            payments::ActiveModel {
                id: ActiveValue::Set(payment_id.to_string()),
                status: ActiveValue::Set(status.as_str().to_string()),
                ..Default::default()
            }
            .update(&db_tx)
            .await?;
            tracing::info!(%payment_id, status = status.as_str(), "payment status changed");
            Ok(())
        })
    }

    /// Payment snapshot with its allocated total.
    pub async fn payment(&self, payment_id: Uuid) -> ResultSettlement<Payment> {
        with_tx!(self, |db_tx| {
            self.require_payment(&db_tx, payment_id, Lock::None).await
        })
    }

    /// Allocations of a payment, oldest first.
    pub async fn payment_allocations(&self, payment_id: Uuid) -> ResultSettlement<Vec<Allocation>> {
        with_tx!(self, |db_tx| {
            self.require_payment(&db_tx, payment_id, Lock::None).await?;
            allocations::Entity::find()
                .filter(allocations::Column::PaymentId.eq(payment_id.to_string()))
                .order_by_asc(allocations::Column::CreatedAt)
                .all(&db_tx)
                .await?
                .into_iter()
                .map(Allocation::try_from)
                .collect::<ResultSettlement<Vec<_>>>()
        })
    }
}
