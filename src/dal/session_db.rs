use sqlx::PgPool;
use uuid::Uuid;

pub async fn get_user_id_by_token(
    pool: &PgPool,
    token: &str,
) -> Result<Option<Uuid>, sqlx::Error> {
    sqlx::query_scalar::<_, Uuid>(
        r#"
        select user_id
        from sessions
        where token = $1
        "#,
    )
    .bind(token)
    .fetch_optional(pool)
    .await
}
