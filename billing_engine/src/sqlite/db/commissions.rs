use sqlx::{Row, SqliteConnection};

use crate::{db_types::Commission, traits::CommissionError};

pub async fn fetch_commission(
    project_id: &str,
    payment_method_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Commission>, CommissionError> {
    let commission = sqlx::query(
        r#"SELECT project_id, payment_method_id, psp_percent, pm_percent, pm_fixed_fee, to_user_percent
        FROM commissions WHERE project_id = $1 AND payment_method_id = $2"#,
    )
    .bind(project_id)
    .bind(payment_method_id)
    .fetch_optional(conn)
    .await?
    .map(|row| -> Result<Commission, sqlx::Error> {
        Ok(Commission {
            project_id: row.try_get("project_id")?,
            payment_method_id: row.try_get("payment_method_id")?,
            psp_percent: row.try_get("psp_percent")?,
            pm_percent: row.try_get("pm_percent")?,
            pm_fixed_fee: row.try_get("pm_fixed_fee")?,
            to_user_percent: row.try_get("to_user_percent")?,
        })
    })
    .transpose()?;
    Ok(commission)
}

pub async fn upsert_commission(commission: &Commission, conn: &mut SqliteConnection) -> Result<(), CommissionError> {
    sqlx::query(
        r#"INSERT INTO commissions (project_id, payment_method_id, psp_percent, pm_percent, pm_fixed_fee, to_user_percent)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (project_id, payment_method_id) DO UPDATE SET
            psp_percent = excluded.psp_percent,
            pm_percent = excluded.pm_percent,
            pm_fixed_fee = excluded.pm_fixed_fee,
            to_user_percent = excluded.to_user_percent"#,
    )
    .bind(&commission.project_id)
    .bind(&commission.payment_method_id)
    .bind(commission.psp_percent)
    .bind(commission.pm_percent)
    .bind(commission.pm_fixed_fee)
    .bind(commission.to_user_percent)
    .execute(conn)
    .await?;
    Ok(())
}
