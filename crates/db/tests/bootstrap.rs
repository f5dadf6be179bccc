use sqlx::PgPool;

/// Full bootstrap test: connect, migrate, verify schema.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_full_bootstrap(pool: PgPool) {
    streamvault_db::health_check(&pool).await.unwrap();

    // Verify all five tables exist and are queryable.
    let tables = [
        "stream_metadata",
        "processing_logs",
        "hls_playlists",
        "hls_merkle_proofs",
        "archive",
    ];

    for table in tables {
        let count: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&pool)
            .await
            .unwrap_or_else(|e| panic!("{table} query failed: {e}"));
        assert_eq!(count.0, 0, "{table} should start empty");
    }
}

/// The archive table must reject duplicate session ids via its unique
/// constraint (named uq_* so the API layer can classify the violation).
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_archive_unique_constraint_name(pool: PgPool) {
    let constraint: (String,) = sqlx::query_as(
        "SELECT conname::text FROM pg_constraint
         WHERE conrelid = 'archive'::regclass AND contype = 'u'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(constraint.0, "uq_archive_session_id");
}
