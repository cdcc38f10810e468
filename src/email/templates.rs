use askama::Template;

use crate::{
    domain::{EmailKind, PaymentConfirmationData},
    email::OutgoingEmail,
    error::{AppError, Result},
};

#[derive(Template)]
#[template(
    ext = "txt",
    source = "Hi {{ data.client_name }},

We have received your payment for invoice {{ data.invoice_number }}.

Project:        {{ data.project_title }}
Amount:         {{ data.amount }}
Payment method: {{ data.payment_method }}
Paid on:        {{ data.paid_date }}

You can review your invoices at {{ data.dashboard_url }}

Thank you!"
)]
struct PaymentConfirmationText<'a> {
    data: &'a PaymentConfirmationData,
}

#[derive(Template)]
#[template(
    ext = "html",
    source = "<p>Hi {{ data.client_name }},</p>
<p>We have received your payment for invoice <strong>{{ data.invoice_number }}</strong>.</p>
<table>
  <tr><td>Project</td><td>{{ data.project_title }}</td></tr>
  <tr><td>Amount</td><td>{{ data.amount }}</td></tr>
  <tr><td>Payment method</td><td>{{ data.payment_method }}</td></tr>
  <tr><td>Paid on</td><td>{{ data.paid_date }}</td></tr>
</table>
<p><a href=\"{{ data.dashboard_url }}\">View your invoices</a></p>
<p>Thank you!</p>"
)]
struct PaymentConfirmationHtml<'a> {
    data: &'a PaymentConfirmationData,
}

/// Renders a queued job's data bag into a ready-to-send email.
pub fn render(
    kind: EmailKind,
    data: &serde_json::Value,
    to_email: &str,
    to_name: Option<&str>,
) -> Result<OutgoingEmail> {
    match kind {
        EmailKind::PaymentConfirmation => {
            let data: PaymentConfirmationData = serde_json::from_value(data.clone())
                .map_err(|e| AppError::Email(format!("Invalid template data: {}", e)))?;

            let text_body = PaymentConfirmationText { data: &data }
                .render()
                .map_err(|e| AppError::Email(format!("Template error: {}", e)))?;
            let html_body = PaymentConfirmationHtml { data: &data }
                .render()
                .map_err(|e| AppError::Email(format!("Template error: {}", e)))?;

            Ok(OutgoingEmail {
                to_email: to_email.to_string(),
                to_name: to_name.map(str::to_string),
                subject: format!("Payment received for invoice {}", data.invoice_number),
                text_body,
                html_body,
            })
        }
    }
}
