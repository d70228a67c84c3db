use std::collections::HashMap;

use chrono::{Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};

use migration::MigratorTrait;
use settlement::{
    CalculationBase, CurrencyCode, CurrencyRepository, Document, Engine, ItemStatus, Money,
    NewPayment, NetDirection, Payable, PaymentDirection, PaymentStatus, PaymentTermStage,
    PaymentTermTemplate, ScheduleItem, SettlementError, standard_periods,
};
use uuid::Uuid;

async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .due_soon_days(3)
        .build()
        .await
        .unwrap();
    engine.add_currency("USD", "US Dollar", Some("$")).await.unwrap();
    engine.add_currency("EUR", "Euro", Some("€")).await.unwrap();
    engine.set_base_currency(code("USD")).await.unwrap();
    (engine, db)
}

fn code(raw: &str) -> CurrencyCode {
    raw.parse().unwrap()
}

fn money(raw: &str) -> Money {
    raw.parse().unwrap()
}

fn dec(raw: &str) -> Decimal {
    raw.parse().unwrap()
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn days_from_today(days: i64) -> NaiveDate {
    if days >= 0 {
        today() + Days::new(days as u64)
    } else {
        today() - Days::new(days.unsigned_abs())
    }
}

/// 30% deposit on the order date (blocking), 70% 30 days after shipment.
fn deposit_balance() -> PaymentTermTemplate {
    PaymentTermTemplate::new(
        "30/70",
        vec![
            PaymentTermStage::new("Deposit", dec("30"), 0, CalculationBase::OrderDate)
                .unwrap()
                .blocking(),
            PaymentTermStage::new("Balance", dec("70"), 30, CalculationBase::ShipmentDate)
                .unwrap(),
        ],
    )
    .unwrap()
}

fn single_stage(days: u32) -> PaymentTermTemplate {
    PaymentTermTemplate::new(
        "net",
        vec![PaymentTermStage::new("Full", dec("100"), days, CalculationBase::OrderDate).unwrap()],
    )
    .unwrap()
}

fn invoice(total: &str, currency: &str) -> Document {
    Document::new(
        Payable::ProformaInvoice(Uuid::new_v4()),
        money(total),
        code(currency),
    )
    .with_payment_term(deposit_balance())
}

async fn record(
    engine: &Engine,
    direction: PaymentDirection,
    currency: &str,
    amount: &str,
) -> Uuid {
    engine
        .record_payment(&NewPayment {
            direction,
            counterparty: "ACME Trading",
            currency: code(currency),
            amount: money(amount),
            paid_on: today(),
            reference: Some("TT-001"),
            attachment: None,
        })
        .await
        .unwrap()
}

fn by_label<'a>(items: &'a [ScheduleItem], label: &str) -> &'a ScheduleItem {
    items.iter().find(|item| item.label == label).unwrap()
}

#[tokio::test]
async fn currencies_have_a_single_base() {
    let (engine, _db) = engine_with_db().await;

    let err = engine.add_currency("usd", "Again", None).await.unwrap_err();
    assert!(matches!(err, SettlementError::ExistingKey(_)));

    engine.set_base_currency(code("EUR")).await.unwrap();
    let directory = engine.currency_directory().await.unwrap();
    let bases: Vec<_> = directory.currencies().filter(|c| c.is_base).collect();
    assert_eq!(bases.len(), 1);
    assert_eq!(bases[0].code, code("EUR"));
    assert!(!directory.find_by_code(code("USD")).unwrap().is_base);

    let err = engine
        .set_currency_active(code("EUR"), false)
        .await
        .unwrap_err();
    assert!(matches!(err, SettlementError::Precondition(_)));

    engine.set_currency_active(code("USD"), false).await.unwrap();
    let err = engine.set_base_currency(code("USD")).await.unwrap_err();
    assert!(matches!(err, SettlementError::Precondition(_)));
}

#[tokio::test]
async fn database_rejects_a_second_base_currency() {
    let (engine, db) = engine_with_db().await;

    let result = db
        .execute(Statement::from_string(
            db.get_database_backend(),
            "UPDATE currencies SET is_base = 1 WHERE code = 'EUR';".to_string(),
        ))
        .await;
    assert!(result.is_err());

    let (first, second) = tokio::join!(
        engine.set_base_currency(code("EUR")),
        engine.set_base_currency(code("USD")),
    );
    assert!(first.is_ok() || second.is_ok());

    let directory = engine.currency_directory().await.unwrap();
    assert_eq!(directory.currencies().filter(|c| c.is_base).count(), 1);
    assert!(directory.base_currency().is_some());
}

#[tokio::test]
async fn exchange_rates_are_dated() {
    let (engine, _db) = engine_with_db().await;
    let jan = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
    let feb = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
    engine
        .add_exchange_rate(code("EUR"), code("USD"), dec("1.08"), jan, None)
        .await
        .unwrap();
    engine
        .add_exchange_rate(code("EUR"), code("USD"), dec("1.10"), feb, None)
        .await
        .unwrap();

    let err = engine
        .add_exchange_rate(code("EUR"), code("GBP"), dec("0.85"), jan, None)
        .await
        .unwrap_err();
    assert!(matches!(err, SettlementError::KeyNotFound(_)));

    let directory = engine.currency_directory().await.unwrap();
    assert_eq!(
        directory.rate(code("EUR"), code("USD"), jan + Days::new(10)),
        Some(dec("1.08"))
    );
    assert_eq!(
        directory.rate(code("EUR"), code("USD"), feb + Days::new(10)),
        Some(dec("1.10"))
    );
    assert_eq!(directory.rate(code("USD"), code("EUR"), feb), None);
}

#[tokio::test]
async fn payment_terms_round_trip() {
    let (engine, _db) = engine_with_db().await;
    let id = engine
        .new_payment_term("30/70", deposit_balance().stages)
        .await
        .unwrap();

    let template = engine.payment_term(id).await.unwrap();
    assert_eq!(template.name, "30/70");
    assert_eq!(template.stages.len(), 2);
    assert_eq!(template.stages[0].label, "Deposit");
    assert!(template.stages[0].is_blocking);
    assert_eq!(template.stages[1].day_offset, 30);
    assert_eq!(template.stages[1].calculation_base, CalculationBase::ShipmentDate);
    assert!(template.is_balanced());
}

#[tokio::test]
async fn generate_schedule_splits_the_total() {
    let (engine, _db) = engine_with_db().await;
    let document = invoice("1000", "USD");

    let created = engine.generate_schedule(&document).await.unwrap();
    assert_eq!(created, 2);

    let items = engine.schedule(document.payable).await.unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].label, "Deposit");
    assert_eq!(items[0].amount, money("300"));
    assert_eq!(items[0].sort_order, 1);
    assert!(items[0].is_blocking);
    assert_eq!(items[1].amount, money("700"));
    assert_eq!(items[1].sort_order, 2);
    assert!(items.iter().all(|i| i.status == ItemStatus::Pending));
    assert!(items.iter().all(|i| i.due_date.is_none()));
    let sum: Money = items.iter().map(|i| i.amount).sum();
    assert_eq!(sum, document.total);

    let err = engine.generate_schedule(&document).await.unwrap_err();
    assert!(matches!(err, SettlementError::Precondition(_)));
}

#[tokio::test]
async fn generate_schedule_needs_a_payment_term() {
    let (engine, _db) = engine_with_db().await;
    let document = Document::new(
        Payable::PurchaseOrder(Uuid::new_v4()),
        money("500"),
        code("USD"),
    );

    let err = engine.generate_schedule(&document).await.unwrap_err();
    assert!(matches!(err, SettlementError::Precondition(_)));
    assert!(engine.schedule(document.payable).await.unwrap().is_empty());
}

#[tokio::test]
async fn zero_total_schedule_is_generated_once() {
    let (engine, _db) = engine_with_db().await;
    let document = invoice("0", "USD");

    assert_eq!(engine.generate_schedule(&document).await.unwrap(), 2);
    let err = engine.generate_schedule(&document).await.unwrap_err();
    assert!(matches!(err, SettlementError::Precondition(_)));

    let items = engine.schedule(document.payable).await.unwrap();
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|i| i.status == ItemStatus::Paid));
}

#[tokio::test]
async fn settled_schedule_is_not_generated_again() {
    let (engine, _db) = engine_with_db().await;
    let document = Document::new(
        Payable::ProformaInvoice(Uuid::new_v4()),
        money("500"),
        code("USD"),
    )
    .with_payment_term(single_stage(0))
    .with_base_date(CalculationBase::OrderDate, today());
    engine.generate_schedule(&document).await.unwrap();
    let item = engine.schedule(document.payable).await.unwrap()[0].id;

    let payment = record(&engine, PaymentDirection::Inbound, "USD", "500").await;
    engine.allocate(payment, item, money("500"), None).await.unwrap();

    let err = engine.generate_schedule(&document).await.unwrap_err();
    assert!(matches!(err, SettlementError::Precondition(_)));
    let items = engine.schedule(document.payable).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].status, ItemStatus::Paid);
}

#[tokio::test]
async fn due_dates_follow_known_base_dates() {
    let (engine, _db) = engine_with_db().await;
    let document =
        invoice("1000", "USD").with_base_date(CalculationBase::OrderDate, today());
    engine.generate_schedule(&document).await.unwrap();

    let items = engine.schedule(document.payable).await.unwrap();
    let deposit = by_label(&items, "Deposit");
    assert_eq!(deposit.due_date, Some(today()));
    assert_eq!(deposit.status, ItemStatus::Due);
    assert_eq!(by_label(&items, "Balance").due_date, None);

    let shipped = days_from_today(10);
    let base_dates = HashMap::from([(CalculationBase::ShipmentDate, shipped)]);
    let resolved = engine
        .resolve_due_dates(document.payable, &base_dates)
        .await
        .unwrap();
    assert_eq!(resolved, 1);

    let items = engine.schedule(document.payable).await.unwrap();
    let balance = by_label(&items, "Balance");
    assert_eq!(balance.due_date, Some(shipped + Days::new(30)));
    assert_eq!(balance.status, ItemStatus::Pending);
}

#[tokio::test]
async fn refresh_statuses_marks_overdue_items() {
    let (engine, _db) = engine_with_db().await;
    let document = Document::new(
        Payable::ProformaInvoice(Uuid::new_v4()),
        money("800"),
        code("USD"),
    )
    .with_payment_term(single_stage(0))
    .with_base_date(CalculationBase::OrderDate, days_from_today(-10));
    engine.generate_schedule(&document).await.unwrap();

    let items = engine.schedule(document.payable).await.unwrap();
    assert_eq!(items[0].status, ItemStatus::Due);

    assert_eq!(engine.refresh_statuses(today()).await.unwrap(), 1);
    let item = engine.schedule_item(items[0].id).await.unwrap();
    assert_eq!(item.status, ItemStatus::Overdue);

    assert_eq!(engine.refresh_statuses(today()).await.unwrap(), 0);
}

#[tokio::test]
async fn allocation_settles_an_item() {
    let (engine, _db) = engine_with_db().await;
    let document = invoice("1000", "USD");
    engine.generate_schedule(&document).await.unwrap();
    let items = engine.schedule(document.payable).await.unwrap();
    let deposit = by_label(&items, "Deposit").id;

    let payment = record(&engine, PaymentDirection::Inbound, "USD", "500").await;
    let allocation = engine
        .allocate(payment, deposit, money("200"), None)
        .await
        .unwrap();
    assert_eq!(allocation.amount, money("200"));
    assert_eq!(allocation.document_amount, money("200"));
    assert_eq!(allocation.exchange_rate, None);

    let item = engine.schedule_item(deposit).await.unwrap();
    assert_eq!(item.paid_amount, money("200"));
    assert_eq!(item.remaining_amount(), money("100"));
    assert_eq!(item.status, ItemStatus::Pending);

    engine
        .allocate(payment, deposit, money("100"), None)
        .await
        .unwrap();
    let item = engine.schedule_item(deposit).await.unwrap();
    assert_eq!(item.status, ItemStatus::Paid);
    assert!(item.remaining_amount().is_zero());

    let payment = engine.payment(payment).await.unwrap();
    assert_eq!(payment.allocated, money("300"));
    assert_eq!(payment.unallocated(), money("200"));

    let err = engine
        .allocate(payment.id, deposit, money("1"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, SettlementError::Precondition(_)));
}

#[tokio::test]
async fn over_allocation_leaves_state_unchanged() {
    let (engine, _db) = engine_with_db().await;
    let document = invoice("1000", "USD");
    engine.generate_schedule(&document).await.unwrap();
    let items = engine.schedule(document.payable).await.unwrap();
    let deposit = by_label(&items, "Deposit").id;
    let balance = by_label(&items, "Balance").id;

    let payment = record(&engine, PaymentDirection::Inbound, "USD", "500").await;

    // Beyond the item's remaining balance.
    let err = engine
        .allocate(payment, deposit, money("300.01"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, SettlementError::OverAllocation(_)));

    // Beyond the payment's unallocated balance.
    let err = engine
        .allocate(payment, balance, money("600"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, SettlementError::OverAllocation(_)));

    let err = engine
        .allocate(payment, balance, Money::ZERO, None)
        .await
        .unwrap_err();
    assert!(matches!(err, SettlementError::InvalidAmount(_)));

    assert!(engine.payment_allocations(payment).await.unwrap().is_empty());
    assert!(engine.payment(payment).await.unwrap().allocated.is_zero());
    let items = engine.schedule(document.payable).await.unwrap();
    assert!(items.iter().all(|i| i.paid_amount.is_zero()));
    assert!(items.iter().all(|i| i.status == ItemStatus::Pending));
}

#[tokio::test]
async fn payment_direction_must_match_the_document() {
    let (engine, _db) = engine_with_db().await;
    let document = invoice("1000", "USD");
    engine.generate_schedule(&document).await.unwrap();
    let items = engine.schedule(document.payable).await.unwrap();

    let payment = record(&engine, PaymentDirection::Outbound, "USD", "300").await;
    let err = engine
        .allocate(payment, items[0].id, money("300"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, SettlementError::Precondition(_)));
}

#[tokio::test]
async fn allocate_in_order_fills_items_one_after_another() {
    let (engine, _db) = engine_with_db().await;
    let template = PaymentTermTemplate::new(
        "30/30/40",
        vec![
            PaymentTermStage::new("Deposit", dec("30"), 0, CalculationBase::OrderDate).unwrap(),
            PaymentTermStage::new("Shipment", dec("30"), 0, CalculationBase::ShipmentDate)
                .unwrap(),
            PaymentTermStage::new("Delivery", dec("40"), 0, CalculationBase::DeliveryDate)
                .unwrap(),
        ],
    )
    .unwrap();
    let document = Document::new(
        Payable::PurchaseOrder(Uuid::new_v4()),
        money("10000"),
        code("USD"),
    )
    .with_payment_term(template);
    engine.generate_schedule(&document).await.unwrap();
    let items = engine.schedule(document.payable).await.unwrap();
    let ids: Vec<Uuid> = items.iter().map(|i| i.id).collect();

    let payment = record(&engine, PaymentDirection::Outbound, "USD", "5000").await;
    let created = engine.allocate_in_order(payment, &ids).await.unwrap();
    assert_eq!(created.len(), 2);
    assert_eq!(created[0].amount, money("3000"));
    assert_eq!(created[1].amount, money("2000"));

    let items = engine.schedule(document.payable).await.unwrap();
    assert_eq!(items[0].status, ItemStatus::Paid);
    assert_eq!(items[1].remaining_amount(), money("1000"));
    assert!(items[2].paid_amount.is_zero());

    let payment_after = engine.payment(payment).await.unwrap();
    assert!(payment_after.unallocated().is_zero());
    let allocated: Money = engine
        .payment_allocations(payment)
        .await
        .unwrap()
        .iter()
        .map(|a| a.amount)
        .sum();
    assert_eq!(allocated, payment_after.amount);

    let err = engine.allocate_in_order(payment, &ids).await.unwrap_err();
    assert!(matches!(err, SettlementError::Precondition(_)));

    let again = record(&engine, PaymentDirection::Outbound, "USD", "10").await;
    let err = engine
        .allocate_in_order(again, &[ids[2], ids[2]])
        .await
        .unwrap_err();
    assert!(matches!(err, SettlementError::Precondition(_)));
}

#[tokio::test]
async fn cross_currency_allocation_uses_the_rate() {
    let (engine, _db) = engine_with_db().await;
    let document = invoice("1000", "USD");
    engine.generate_schedule(&document).await.unwrap();
    let items = engine.schedule(document.payable).await.unwrap();
    let deposit = by_label(&items, "Deposit").id;
    let balance = by_label(&items, "Balance").id;

    let payment = record(&engine, PaymentDirection::Inbound, "EUR", "500").await;

    let err = engine
        .allocate(payment, deposit, money("100"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, SettlementError::MissingRate { .. }));

    // Explicit rate.
    let allocation = engine
        .allocate(payment, deposit, money("100"), Some(dec("1.1")))
        .await
        .unwrap();
    assert_eq!(allocation.exchange_rate, Some(dec("1.1")));
    assert_eq!(allocation.document_amount, money("110"));

    // Stored rate valid on the payment date.
    engine
        .add_exchange_rate(code("EUR"), code("USD"), dec("1.2"), days_from_today(-30), None)
        .await
        .unwrap();
    let allocation = engine
        .allocate(payment, balance, money("100"), None)
        .await
        .unwrap();
    assert_eq!(allocation.exchange_rate, Some(dec("1.2")));
    assert_eq!(allocation.document_amount, money("120"));

    let item = engine.schedule_item(deposit).await.unwrap();
    assert_eq!(item.paid_amount, money("110"));
    let payment = engine.payment(payment).await.unwrap();
    assert_eq!(payment.allocated, money("200"));

    let err = engine
        .allocate(payment.id, deposit, money("10"), Some(Decimal::ZERO))
        .await
        .unwrap_err();
    assert!(matches!(err, SettlementError::InvalidAmount(_)));

    let err = engine
        .allocate_in_order(payment.id, &[deposit])
        .await
        .unwrap_err();
    assert!(matches!(err, SettlementError::CurrencyMismatch(_)));
}

#[tokio::test]
async fn payments_are_approved_or_rejected_once() {
    let (engine, _db) = engine_with_db().await;
    let payment = record(&engine, PaymentDirection::Inbound, "USD", "100").await;
    assert_eq!(
        engine.payment(payment).await.unwrap().status,
        PaymentStatus::PendingApproval
    );

    engine.approve_payment(payment).await.unwrap();
    assert_eq!(
        engine.payment(payment).await.unwrap().status,
        PaymentStatus::Approved
    );
    let err = engine.reject_payment(payment).await.unwrap_err();
    assert!(matches!(err, SettlementError::Precondition(_)));

    let rejected = record(&engine, PaymentDirection::Inbound, "USD", "100").await;
    engine.reject_payment(rejected).await.unwrap();

    let document = invoice("1000", "USD");
    engine.generate_schedule(&document).await.unwrap();
    let items = engine.schedule(document.payable).await.unwrap();
    let err = engine
        .allocate(rejected, items[0].id, money("50"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, SettlementError::Precondition(_)));

    let allocated = record(&engine, PaymentDirection::Inbound, "USD", "100").await;
    engine
        .allocate(allocated, items[0].id, money("50"), None)
        .await
        .unwrap();
    let err = engine.reject_payment(allocated).await.unwrap_err();
    assert!(matches!(err, SettlementError::Precondition(_)));
}

#[tokio::test]
async fn record_payment_validates_input() {
    let (engine, _db) = engine_with_db().await;
    let mut input = NewPayment {
        direction: PaymentDirection::Inbound,
        counterparty: "ACME Trading",
        currency: code("USD"),
        amount: Money::ZERO,
        paid_on: today(),
        reference: None,
        attachment: None,
    };
    let err = engine.record_payment(&input).await.unwrap_err();
    assert!(matches!(err, SettlementError::InvalidAmount(_)));

    input.amount = money("10");
    input.currency = code("JPY");
    let err = engine.record_payment(&input).await.unwrap_err();
    assert!(matches!(err, SettlementError::KeyNotFound(_)));

    engine.set_currency_active(code("EUR"), false).await.unwrap();
    input.currency = code("EUR");
    let err = engine.record_payment(&input).await.unwrap_err();
    assert!(matches!(err, SettlementError::Precondition(_)));
}

#[tokio::test]
async fn credits_offset_items_of_the_same_flow() {
    let (engine, _db) = engine_with_db().await;
    let document = invoice("1000", "USD");
    engine.generate_schedule(&document).await.unwrap();
    let items = engine.schedule(document.payable).await.unwrap();
    let deposit = by_label(&items, "Deposit").id;
    let balance = by_label(&items, "Balance").id;

    let credit = engine
        .add_credit_item(document.payable, "Damaged goods", money("150"))
        .await
        .unwrap();
    let credit_item = engine.schedule_item(credit).await.unwrap();
    assert!(credit_item.is_credit);
    assert_eq!(credit_item.currency, code("USD"));
    assert_eq!(credit_item.sort_order, 3);

    let err = engine
        .apply_credit(credit, balance, money("200"))
        .await
        .unwrap_err();
    assert!(matches!(err, SettlementError::OverAllocation(_)));

    let err = engine
        .apply_credit(deposit, balance, money("10"))
        .await
        .unwrap_err();
    assert!(matches!(err, SettlementError::Precondition(_)));

    let application = engine
        .apply_credit(credit, balance, money("100"))
        .await
        .unwrap();
    assert_eq!(application.amount, money("100"));

    let target = engine.schedule_item(balance).await.unwrap();
    assert_eq!(target.credited_amount, money("100"));
    assert_eq!(target.remaining_amount(), money("600"));
    let credit_item = engine.schedule_item(credit).await.unwrap();
    assert_eq!(credit_item.remaining_amount(), money("50"));

    engine
        .apply_credit(credit, deposit, money("50"))
        .await
        .unwrap();
    let credit_item = engine.schedule_item(credit).await.unwrap();
    assert!(credit_item.remaining_amount().is_zero());
    assert_eq!(credit_item.status, ItemStatus::Paid);

    let err = engine
        .apply_credit(credit, deposit, money("1"))
        .await
        .unwrap_err();
    assert!(matches!(err, SettlementError::Precondition(_)));

    let other = invoice("500", "USD");
    let err = engine
        .add_credit_item(other.payable, "Nothing to credit", money("10"))
        .await
        .unwrap_err();
    assert!(matches!(err, SettlementError::Precondition(_)));
}

#[tokio::test]
async fn waive_resolves_an_item() {
    let (engine, _db) = engine_with_db().await;
    let document = invoice("1000", "USD");
    engine.generate_schedule(&document).await.unwrap();
    let items = engine.schedule(document.payable).await.unwrap();
    let deposit = by_label(&items, "Deposit").id;

    let payment = record(&engine, PaymentDirection::Inbound, "USD", "100").await;
    engine
        .allocate(payment, deposit, money("100"), None)
        .await
        .unwrap();

    engine
        .waive(deposit, Some("  commercial gesture  "))
        .await
        .unwrap();
    let item = engine.schedule_item(deposit).await.unwrap();
    assert_eq!(item.status, ItemStatus::Waived);
    assert!(!item.is_blocking);
    assert_eq!(item.waived_reason.as_deref(), Some("commercial gesture"));
    assert_eq!(item.paid_amount, money("100"));

    let err = engine.waive(deposit, None).await.unwrap_err();
    assert!(matches!(err, SettlementError::Precondition(_)));

    let err = engine
        .allocate(payment, deposit, money("1"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, SettlementError::Precondition(_)));

    assert_eq!(engine.refresh_statuses(today()).await.unwrap(), 0);
    let item = engine.schedule_item(deposit).await.unwrap();
    assert_eq!(item.status, ItemStatus::Waived);
}

#[tokio::test]
async fn regenerate_keeps_settled_items() {
    let (engine, _db) = engine_with_db().await;
    let document = invoice("1000", "USD");
    engine.generate_schedule(&document).await.unwrap();
    let before = engine.schedule(document.payable).await.unwrap();
    let deposit = by_label(&before, "Deposit").id;
    let old_balance = by_label(&before, "Balance").id;

    let payment = record(&engine, PaymentDirection::Inbound, "USD", "300").await;
    engine
        .allocate(payment, deposit, money("300"), None)
        .await
        .unwrap();

    let mut revised = document.clone();
    revised.total = money("2000");
    let created = engine.regenerate_schedule(&revised).await.unwrap();
    assert_eq!(created, 1);

    let after = engine.schedule(document.payable).await.unwrap();
    assert_eq!(after.len(), 2);
    let kept = by_label(&after, "Deposit");
    assert_eq!(kept.id, deposit);
    assert_eq!(kept.amount, money("300"));
    assert_eq!(kept.status, ItemStatus::Paid);
    assert_eq!(kept.paid_amount, money("300"));

    let balance = by_label(&after, "Balance");
    assert_ne!(balance.id, old_balance);
    assert_eq!(balance.amount, money("1400"));
    assert_eq!(balance.sort_order, 2);

    let allocations = engine.payment_allocations(payment).await.unwrap();
    assert_eq!(allocations.len(), 1);
    assert_eq!(allocations[0].schedule_item_id, deposit);
}

#[tokio::test]
async fn regenerate_needs_an_existing_schedule() {
    let (engine, _db) = engine_with_db().await;
    let document = invoice("1000", "USD");
    let err = engine.regenerate_schedule(&document).await.unwrap_err();
    assert!(matches!(err, SettlementError::Precondition(_)));

    engine.generate_schedule(&document).await.unwrap();
    let created = engine.regenerate_schedule(&document).await.unwrap();
    assert_eq!(created, 2);
    assert_eq!(engine.schedule(document.payable).await.unwrap().len(), 2);
}

#[tokio::test]
async fn regenerate_replaces_every_open_stage() {
    let (engine, _db) = engine_with_db().await;
    let template = PaymentTermTemplate::new(
        "20/30/50",
        vec![
            PaymentTermStage::new("Deposit", dec("20"), 0, CalculationBase::OrderDate).unwrap(),
            PaymentTermStage::new("Production", dec("30"), 30, CalculationBase::OrderDate)
                .unwrap(),
            PaymentTermStage::new("Balance", dec("50"), 30, CalculationBase::ShipmentDate)
                .unwrap(),
        ],
    )
    .unwrap();
    let document = Document::new(
        Payable::ProformaInvoice(Uuid::new_v4()),
        money("1000"),
        code("USD"),
    )
    .with_payment_term(template);
    engine.generate_schedule(&document).await.unwrap();
    let before = engine.schedule(document.payable).await.unwrap();
    let deposit = by_label(&before, "Deposit").id;
    let old_production = by_label(&before, "Production").id;
    let old_balance = by_label(&before, "Balance").id;

    let payment = record(&engine, PaymentDirection::Inbound, "USD", "200").await;
    engine
        .allocate(payment, deposit, money("200"), None)
        .await
        .unwrap();

    let mut revised = document.clone();
    revised.total = money("2000");
    assert_eq!(engine.regenerate_schedule(&revised).await.unwrap(), 2);

    let after = engine.schedule(document.payable).await.unwrap();
    assert_eq!(after.len(), 3);
    let kept = by_label(&after, "Deposit");
    assert_eq!(kept.id, deposit);
    assert_eq!(kept.status, ItemStatus::Paid);
    assert_eq!(kept.sort_order, 1);

    let production = by_label(&after, "Production");
    assert_ne!(production.id, old_production);
    assert_eq!(production.amount, money("600"));
    assert_eq!(production.status, ItemStatus::Pending);
    let balance = by_label(&after, "Balance");
    assert_ne!(balance.id, old_balance);
    assert_eq!(balance.amount, money("1000"));
    assert_eq!(balance.status, ItemStatus::Pending);

    let mut orders: Vec<_> = after.iter().map(|i| i.sort_order).collect();
    orders.sort_unstable();
    assert_eq!(orders, vec![1, 2, 3]);
    assert!(production.sort_order > kept.sort_order);
    assert!(balance.sort_order > kept.sort_order);
}

#[tokio::test]
async fn cash_flow_projects_outstanding_items() {
    let (engine, _db) = engine_with_db().await;
    engine.add_currency("GBP", "Pound Sterling", Some("£")).await.unwrap();
    engine
        .add_exchange_rate(code("EUR"), code("USD"), dec("1.1"), days_from_today(-365), None)
        .await
        .unwrap();

    // Receivable: deposit due today, balance without a shipment date.
    let receivable =
        invoice("1000", "USD").with_base_date(CalculationBase::OrderDate, today());
    engine.generate_schedule(&receivable).await.unwrap();

    // Payable in EUR, due in 40 days.
    let eur_order = Document::new(
        Payable::PurchaseOrder(Uuid::new_v4()),
        money("1000"),
        code("EUR"),
    )
    .with_payment_term(single_stage(40))
    .with_base_date(CalculationBase::OrderDate, today());
    engine.generate_schedule(&eur_order).await.unwrap();

    // Payable in GBP, no rate to USD, due in 20 days.
    let gbp_order = Document::new(
        Payable::PurchaseOrder(Uuid::new_v4()),
        money("500"),
        code("GBP"),
    )
    .with_payment_term(single_stage(20))
    .with_base_date(CalculationBase::OrderDate, today());
    engine.generate_schedule(&gbp_order).await.unwrap();

    // A settled item drops out of the projection.
    let paid = Document::new(
        Payable::ProformaInvoice(Uuid::new_v4()),
        money("50"),
        code("USD"),
    )
    .with_payment_term(single_stage(0))
    .with_base_date(CalculationBase::OrderDate, today());
    engine.generate_schedule(&paid).await.unwrap();
    let paid_item = engine.schedule(paid.payable).await.unwrap()[0].id;
    let payment = record(&engine, PaymentDirection::Inbound, "USD", "50").await;
    engine
        .allocate(payment, paid_item, money("50"), None)
        .await
        .unwrap();

    let report = engine
        .project_cash_flow(&standard_periods(), today())
        .await
        .unwrap();
    assert_eq!(report.base_currency, code("USD"));

    let bucket = |label: &str| report.buckets.iter().find(|b| b.label == label).unwrap();
    assert_eq!(bucket("this week").inflow.converted, money("300"));
    assert_eq!(bucket("this week").item_count, 1);
    assert_eq!(report.unscheduled.inflow.converted, money("700"));
    assert_eq!(bucket("60 days").outflow.converted, money("1100"));
    assert_eq!(
        bucket("30 days").outflow.unconverted.get(&code("GBP")),
        Some(&money("500"))
    );
    assert!(bucket("30 days").outflow.converted.is_zero());

    assert_eq!(report.total_inflow(), money("1000"));
    assert_eq!(report.total_outflow(), money("1100"));
    assert_eq!(report.net().abs(), money("100"));
    assert_eq!(report.net().direction(), NetDirection::Outflow);
    assert!(report.has_conversion_warning());
    assert_eq!(report.unconverted_currencies(), vec![code("GBP")]);
}

#[tokio::test]
async fn cash_flow_needs_a_base_currency() {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder().database(db).build().await.unwrap();
    engine.add_currency("USD", "US Dollar", None).await.unwrap();

    let err = engine
        .project_cash_flow(&standard_periods(), today())
        .await
        .unwrap_err();
    assert!(matches!(err, SettlementError::Precondition(_)));
}
