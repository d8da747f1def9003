use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum_coffee_api::{config::AppConfig, db::create_pool};
use chrono::{Duration, Utc};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    // Ensure migrations are applied.
    sqlx::migrate!("./migrations").run(&pool).await?;

    let admin_id = ensure_user_with_role(&pool, "staff@coffee.example", "staff123", "admin").await?;
    let user_id = ensure_user_with_role(&pool, "customer@coffee.example", "customer123", "user").await?;
    seed_products(&pool).await?;
    seed_promotions(&pool).await?;

    println!("Seed completed. Staff ID: {admin_id}, Customer ID: {user_id}");
    Ok(())
}

async fn ensure_user_with_role(
    pool: &sqlx::PgPool,
    email: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .to_string();

    let row: Option<(Uuid,)> = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, password_hash, role)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .fetch_optional(pool)
    .await?;

    // If user already exists, fetch id
    let user_id = match row {
        Some((id,)) => id,
        None => {
            let existing: (Uuid,) = sqlx::query_as("SELECT id FROM users WHERE email = $1")
                .bind(email)
                .fetch_one(pool)
                .await?;
            existing.0
        }
    };

    println!("Ensured user {email} (role={role})");
    Ok(user_id)
}

async fn seed_products(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let products = vec![
        ("Espresso Blend 250g", "Dark roast, chocolate and caramel notes", 145_000, 80),
        ("Single Origin Da Lat 250g", "Washed arabica from the highlands", 185_000, 60),
        ("Cold Brew Bottle", "Slow-steeped, ready to drink", 55_000, 120),
        ("Phin Filter", "Traditional stainless steel drip filter", 75_000, 40),
        ("Condensed Milk 380g", "For a proper ca phe sua da", 32_000, 200),
    ];

    for (name, desc, price, stock) in products {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, description, price, stock)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(desc)
        .bind(price)
        .bind(stock)
        .execute(pool)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}

async fn seed_promotions(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let now = Utc::now();
    let promotions = vec![
        ("WELCOME10", "PERCENT", 10_i64, 100_000_i64),
        ("FREESHIP15K", "FIXED", 15_000_i64, 200_000_i64),
    ];

    for (code, discount_type, value, min_order) in promotions {
        sqlx::query(
            r#"
            INSERT INTO promotions
                (id, code, discount_type, discount_value, min_order_value, starts_at, ends_at, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE)
            ON CONFLICT (code) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(code)
        .bind(discount_type)
        .bind(value)
        .bind(min_order)
        .bind(now - Duration::days(1))
        .bind(now + Duration::days(90))
        .execute(pool)
        .await?;
    }

    println!("Seeded promotions");
    Ok(())
}
