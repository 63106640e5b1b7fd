use sqlx::{Row, SqliteConnection};

use crate::{db_types::VatRate, traits::VatError};

/// The subdivision's rate if there is one, otherwise the country-wide rate.
pub async fn fetch_vat_rate(
    country: &str,
    subdivision: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Option<VatRate>, VatError> {
    let rate = sqlx::query(
        r#"SELECT country, subdivision, rate FROM vat_rates
        WHERE country = $1 AND (subdivision = '' OR subdivision = $2)
        ORDER BY subdivision DESC LIMIT 1"#,
    )
    .bind(country)
    .bind(subdivision.unwrap_or_default())
    .fetch_optional(conn)
    .await?
    .map(|row| -> Result<VatRate, sqlx::Error> {
        let subdivision: String = row.try_get("subdivision")?;
        Ok(VatRate {
            country: row.try_get("country")?,
            subdivision: Some(subdivision).filter(|s| !s.is_empty()),
            rate: row.try_get("rate")?,
        })
    })
    .transpose()?;
    Ok(rate)
}

pub async fn upsert_vat_rate(rate: &VatRate, conn: &mut SqliteConnection) -> Result<(), VatError> {
    sqlx::query(
        r#"INSERT INTO vat_rates (country, subdivision, rate) VALUES ($1, $2, $3)
        ON CONFLICT (country, subdivision) DO UPDATE SET rate = excluded.rate"#,
    )
    .bind(&rate.country)
    .bind(rate.subdivision.as_deref().unwrap_or_default())
    .bind(rate.rate)
    .execute(conn)
    .await?;
    Ok(())
}
