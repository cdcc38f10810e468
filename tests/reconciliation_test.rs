mod common;

use agency::{
    domain::{InvoiceStatus, PaymentStatus},
    error::AppError,
    payments::ReconcileOutcome,
    repository::{InvoiceRepository, OutboxRepository, PaymentRepository},
};
use common::{setup, signed_notification};

#[tokio::test]
async fn test_settlement_completes_payment_and_pays_invoice() -> anyhow::Result<()> {
    for status in ["capture", "settlement"] {
        let app = setup().await?;
        let fx = app.seed("ORD-2001", 15_000_000, 1).await?;
        app.gateway.set_status("ORD-2001", status);

        let outcome = app.ctx.reconciler
            .handle_notification(signed_notification("ORD-2001", "150000.00", status))
            .await?;
        assert!(matches!(outcome, ReconcileOutcome::Updated { previous: PaymentStatus::Pending, .. }));

        let payment = app.ctx.payment_repo.find_by_id(fx.payment.id).await?.unwrap();
        assert_eq!(payment.status, PaymentStatus::Completed);
        assert!(payment.paid_at.is_some());
        assert_eq!(payment.payment_method.as_deref(), Some("bank_transfer"));
        assert_eq!(payment.gateway_transaction_id.as_deref(), Some("txn-ORD-2001"));

        let invoice = app.ctx.invoice_repo.find_by_id(fx.invoice.id).await?.unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Paid);
        assert!(invoice.paid_at.is_some());

        let event = app.ctx.outbox_repo
            .find_by_idempotency_key("payment.completed:txn-ORD-2001")
            .await?;
        assert!(event.is_some(), "completed payment must emit an event ({})", status);
    }

    Ok(())
}

#[tokio::test]
async fn test_pending_leaves_invoice_untouched() -> anyhow::Result<()> {
    let app = setup().await?;
    let fx = app.seed("ORD-2002", 5_000_000, 1).await?;
    app.gateway.set_status("ORD-2002", "pending");

    app.ctx.reconciler
        .handle_notification(signed_notification("ORD-2002", "50000.00", "pending"))
        .await?;

    let payment = app.ctx.payment_repo.find_by_id(fx.payment.id).await?.unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert!(payment.paid_at.is_none());

    let invoice = app.ctx.invoice_repo.find_by_id(fx.invoice.id).await?.unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Pending);
    assert_eq!(invoice.updated_at, fx.invoice.updated_at);
    assert_eq!(app.count("outbox_events").await, 0);

    Ok(())
}

#[tokio::test]
async fn test_failed_payment_keeps_invoice_pending() -> anyhow::Result<()> {
    for status in ["deny", "cancel", "expire"] {
        let app = setup().await?;
        let fx = app.seed("ORD-2003", 5_000_000, 1).await?;
        app.gateway.set_status("ORD-2003", status);

        app.ctx.reconciler
            .handle_notification(signed_notification("ORD-2003", "50000.00", status))
            .await?;

        let payment = app.ctx.payment_repo.find_by_id(fx.payment.id).await?.unwrap();
        assert_eq!(payment.status, PaymentStatus::Failed, "{}", status);

        let invoice = app.ctx.invoice_repo.find_by_id(fx.invoice.id).await?.unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Pending, "{}", status);
        assert!(invoice.paid_at.is_none());
    }

    Ok(())
}

#[tokio::test]
async fn test_refund_and_unknown_status_leave_invoice_untouched() -> anyhow::Result<()> {
    let app = setup().await?;
    let refunded = app.seed("ORD-2004", 5_000_000, 0).await?;
    let processing = app.seed("ORD-2005", 5_000_000, 0).await?;
    app.gateway.set_status("ORD-2004", "refund");
    app.gateway.set_status("ORD-2005", "authorize");

    app.ctx.reconciler
        .handle_notification(signed_notification("ORD-2004", "50000.00", "refund"))
        .await?;
    let outcome = app.ctx.reconciler
        .handle_notification(signed_notification("ORD-2005", "50000.00", "authorize"))
        .await?;
    assert_eq!(outcome.gateway_status().as_str(), "authorize");

    let payment = app.ctx.payment_repo.find_by_id(refunded.payment.id).await?.unwrap();
    assert_eq!(payment.status, PaymentStatus::Refunded);
    let payment = app.ctx.payment_repo.find_by_id(processing.payment.id).await?.unwrap();
    assert_eq!(payment.status, PaymentStatus::Processing);

    for invoice in [&refunded.invoice, &processing.invoice] {
        let stored = app.ctx.invoice_repo.find_by_id(invoice.id).await?.unwrap();
        assert_eq!(stored.status, InvoiceStatus::Pending);
    }

    Ok(())
}

#[tokio::test]
async fn test_gateway_status_wins_over_notification_body() -> anyhow::Result<()> {
    let app = setup().await?;
    let fx = app.seed("ORD-2006", 5_000_000, 0).await?;
    // The body claims settlement, the gateway says the charge was denied.
    app.gateway.set_status("ORD-2006", "deny");

    app.ctx.reconciler
        .handle_notification(signed_notification("ORD-2006", "50000.00", "settlement"))
        .await?;

    let payment = app.ctx.payment_repo.find_by_id(fx.payment.id).await?.unwrap();
    assert_eq!(payment.status, PaymentStatus::Failed);

    Ok(())
}

#[tokio::test]
async fn test_redelivery_after_completion_is_a_noop() -> anyhow::Result<()> {
    let app = setup().await?;
    let fx = app.seed("ORD-2007", 5_000_000, 2).await?;
    app.gateway.set_status("ORD-2007", "settlement");

    let notification = signed_notification("ORD-2007", "50000.00", "settlement");
    app.ctx.reconciler.handle_notification(notification.clone()).await?;
    let first = app.ctx.payment_repo.find_by_id(fx.payment.id).await?.unwrap();

    let outcome = app.ctx.reconciler.handle_notification(notification).await?;
    assert!(matches!(outcome, ReconcileOutcome::AlreadyProcessed { .. }));

    let second = app.ctx.payment_repo.find_by_id(fx.payment.id).await?.unwrap();
    assert_eq!(first.paid_at, second.paid_at);
    assert_eq!(first.updated_at, second.updated_at);
    assert_eq!(app.count("outbox_events").await, 1);

    Ok(())
}

#[tokio::test]
async fn test_late_failure_does_not_downgrade_completed_payment() -> anyhow::Result<()> {
    let app = setup().await?;
    let fx = app.seed("ORD-2008", 5_000_000, 0).await?;

    app.gateway.set_status("ORD-2008", "settlement");
    app.ctx.reconciler
        .handle_notification(signed_notification("ORD-2008", "50000.00", "settlement"))
        .await?;

    app.gateway.set_status("ORD-2008", "deny");
    let outcome = app.ctx.reconciler
        .handle_notification(signed_notification("ORD-2008", "50000.00", "deny"))
        .await?;
    assert!(matches!(outcome, ReconcileOutcome::Ignored { .. }));

    let payment = app.ctx.payment_repo.find_by_id(fx.payment.id).await?.unwrap();
    assert_eq!(payment.status, PaymentStatus::Completed);
    let invoice = app.ctx.invoice_repo.find_by_id(fx.invoice.id).await?.unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Paid);

    Ok(())
}

#[tokio::test]
async fn test_bad_signature_is_rejected_before_any_lookup() -> anyhow::Result<()> {
    let app = setup().await?;
    let fx = app.seed("ORD-2009", 5_000_000, 0).await?;
    app.gateway.set_status("ORD-2009", "settlement");

    let mut notification = signed_notification("ORD-2009", "50000.00", "settlement");
    notification.gross_amount = "1.00".to_string();

    let result = app.ctx.reconciler.handle_notification(notification).await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));
    assert!(app.gateway.calls().is_empty());

    let payment = app.ctx.payment_repo.find_by_id(fx.payment.id).await?.unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);

    Ok(())
}

#[tokio::test]
async fn test_missing_fields_are_rejected() -> anyhow::Result<()> {
    let app = setup().await?;

    let mut notification = signed_notification("ORD-2010", "50000.00", "settlement");
    notification.status_code = String::new();

    let result = app.ctx.reconciler.handle_notification(notification).await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));
    assert!(app.gateway.calls().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_unknown_order_is_not_found_without_writes() -> anyhow::Result<()> {
    let app = setup().await?;
    app.seed("ORD-2011", 5_000_000, 1).await?;
    app.gateway.set_status("ORD-9999", "settlement");

    let result = app.ctx.reconciler
        .handle_notification(signed_notification("ORD-9999", "50000.00", "settlement"))
        .await;
    assert!(matches!(result, Err(AppError::NotFound(_))));

    let pending: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payments WHERE status = 'Pending'")
        .fetch_one(&app.pool)
        .await?;
    assert_eq!(pending, 1);
    assert_eq!(app.count("outbox_events").await, 0);

    Ok(())
}

#[tokio::test]
async fn test_gateway_failure_leaves_state_unchanged() -> anyhow::Result<()> {
    let app = setup().await?;
    let fx = app.seed("ORD-2012", 5_000_000, 0).await?;
    app.gateway.set_error("ORD-2012", "connection reset");

    let result = app.ctx.reconciler
        .handle_notification(signed_notification("ORD-2012", "50000.00", "settlement"))
        .await;
    assert!(matches!(result, Err(AppError::Gateway(_))));

    let payment = app.ctx.payment_repo.find_by_id(fx.payment.id).await?.unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);
    let invoice = app.ctx.invoice_repo.find_by_id(fx.invoice.id).await?.unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Pending);

    Ok(())
}

#[tokio::test]
async fn test_redelivered_refund_is_already_processed() -> anyhow::Result<()> {
    let app = setup().await?;
    let fx = app.seed("ORD-2010", 5_000_000, 0).await?;

    app.gateway.set_status("ORD-2010", "settlement");
    app.ctx.reconciler
        .handle_notification(signed_notification("ORD-2010", "50000.00", "settlement"))
        .await?;

    app.gateway.set_status("ORD-2010", "refund");
    let refund = signed_notification("ORD-2010", "50000.00", "refund");
    let outcome = app.ctx.reconciler.handle_notification(refund.clone()).await?;
    assert!(matches!(outcome, ReconcileOutcome::Updated { previous: PaymentStatus::Completed, .. }));
    let refunded = app.ctx.payment_repo.find_by_id(fx.payment.id).await?.unwrap();

    let outcome = app.ctx.reconciler.handle_notification(refund).await?;
    assert!(matches!(outcome, ReconcileOutcome::AlreadyProcessed { .. }));
    assert_eq!(outcome.payment().status, PaymentStatus::Refunded);

    // Refunds are final.
    app.gateway.set_status("ORD-2010", "settlement");
    let outcome = app.ctx.reconciler
        .handle_notification(signed_notification("ORD-2010", "50000.00", "settlement"))
        .await?;
    assert!(matches!(outcome, ReconcileOutcome::Ignored { .. }));

    let stored = app.ctx.payment_repo.find_by_id(fx.payment.id).await?.unwrap();
    assert_eq!(stored.status, PaymentStatus::Refunded);
    assert_eq!(stored.updated_at, refunded.updated_at);

    Ok(())
}
