use agency::{
    domain::{
        CreateUserRequest, Invoice, InvoiceStatus, Payment, PaymentStatus, Project, UserRole,
    },
    repository::{
        InvoiceRepository, SqliteInvoiceRepository,
        PaymentRepository, SqlitePaymentRepository,
        ProjectRepository, SqliteProjectRepository,
        UserRepository, SqliteUserRepository,
    },
};
use chrono::{Duration, Utc};
use clap::Parser;
use fake::{
    faker::{company::en::CompanyName, internet::en::SafeEmail, name::en::Name},
    Fake,
};
use rand::Rng;
use sqlx::sqlite::SqlitePoolOptions;
use uuid::Uuid;

/// Populate a development database with users, projects, invoices and
/// pending payments ready to receive gateway webhooks.
#[derive(Parser, Debug)]
#[command(name = "seed")]
struct Args {
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://agency.db?mode=rwc")]
    database_url: String,

    #[arg(long, default_value_t = 2)]
    admins: usize,

    #[arg(long, default_value_t = 3)]
    clients: usize,

    #[arg(long, default_value_t = 2)]
    invoices_per_client: usize,

    #[arg(long, default_value = "IDR")]
    currency: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    println!("🌱 Starting database seeding...");

    let db_pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&args.database_url)
        .await?;

    println!("📋 Running migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await?;

    let user_repo = SqliteUserRepository::new(db_pool.clone());
    let project_repo = SqliteProjectRepository::new(db_pool.clone());
    let invoice_repo = SqliteInvoiceRepository::new(db_pool.clone());
    let payment_repo = SqlitePaymentRepository::new(db_pool.clone());

    println!("👥 Creating users...");
    for _ in 0..args.admins {
        let admin = user_repo.create(CreateUserRequest {
            email: SafeEmail().fake(),
            full_name: Name().fake(),
            role: UserRole::Admin,
        }).await?;
        println!("  ✅ Admin {} <{}>", admin.full_name, admin.email);
    }

    let mut rng = rand::thread_rng();
    let mut order_seq = 1001;

    for _ in 0..args.clients {
        let client = user_repo.create(CreateUserRequest {
            email: SafeEmail().fake(),
            full_name: Name().fake(),
            role: UserRole::Client,
        }).await?;

        let company: String = CompanyName().fake();
        let project = project_repo.create(Project {
            id: Uuid::new_v4(),
            title: format!("{} website redesign", company),
            client_id: client.id,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }).await?;

        for _ in 0..args.invoices_per_client {
            let amount_cents = rng.gen_range(50..5_000) as i64 * 100_000;
            let invoice = invoice_repo.create(Invoice {
                id: Uuid::new_v4(),
                invoice_number: format!("INV-{}-{:04}", Utc::now().format("%Y"), order_seq),
                project_id: project.id,
                client_id: client.id,
                amount_cents,
                currency: args.currency.clone(),
                status: InvoiceStatus::Pending,
                due_date: Utc::now() + Duration::days(14),
                paid_at: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            }).await?;

            let payment = payment_repo.create(Payment {
                id: Uuid::new_v4(),
                invoice_id: invoice.id,
                order_id: format!("ORD-{}", order_seq),
                amount_cents,
                currency: args.currency.clone(),
                status: PaymentStatus::Pending,
                payment_method: None,
                gateway_transaction_id: None,
                paid_at: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            }).await?;

            println!(
                "  🧾 {} for {} ({}), order {}",
                invoice.invoice_number, client.full_name, project.title, payment.order_id
            );
            order_seq += 1;
        }
    }

    println!("✨ Seeding complete");

    Ok(())
}
