use sqlx::{Row, SqliteConnection};

use crate::{db_types::ExchangeRate, traits::ExchangeRateError};

/// The latest stored rate for converting `from` into `to`, if there is one.
pub async fn fetch_last_rate(
    from: &str,
    to: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<ExchangeRate>, ExchangeRateError> {
    let rate = sqlx::query(
        r#"SELECT from_currency, to_currency, rate, updated_at FROM exchange_rates
        WHERE from_currency = $1 AND to_currency = $2 ORDER BY updated_at DESC, id DESC LIMIT 1"#,
    )
    .bind(from)
    .bind(to)
    .fetch_optional(conn)
    .await?
    .map(|row| -> Result<ExchangeRate, sqlx::Error> {
        Ok(ExchangeRate {
            from_currency: row.try_get("from_currency")?,
            to_currency: row.try_get("to_currency")?,
            rate: row.try_get("rate")?,
            updated_at: row.try_get("updated_at")?,
        })
    })
    .transpose()?;
    Ok(rate)
}

/// The rate for converting `from` into `to`, falling back to the inverse of the `to` -> `from` rate.
pub async fn fetch_rate(from: &str, to: &str, conn: &mut SqliteConnection) -> Result<ExchangeRate, ExchangeRateError> {
    if let Some(rate) = fetch_last_rate(from, to, conn).await? {
        return Ok(rate);
    }
    fetch_last_rate(to, from, conn)
        .await?
        .filter(|r| r.rate != 0.0)
        .map(|r| r.inverse())
        .ok_or_else(|| ExchangeRateError::RateDoesNotExist(from.to_string(), to.to_string()))
}

pub async fn set_exchange_rate(rate: &ExchangeRate, conn: &mut SqliteConnection) -> Result<(), ExchangeRateError> {
    sqlx::query(
        r#"INSERT INTO exchange_rates (from_currency, to_currency, rate, updated_at) VALUES ($1, $2, $3, $4)"#,
    )
    .bind(&rate.from_currency)
    .bind(&rate.to_currency)
    .bind(rate.rate)
    .bind(rate.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}
