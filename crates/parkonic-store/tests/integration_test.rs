use std::path::PathBuf;

use chrono::{NaiveDate, NaiveDateTime};
use parkonic_core::{
    CoreError, TicketFields, TicketId, TicketKind, TicketQuery, TicketRepository,
};
use parkonic_store::{
    create_sqlite_pool, describe_columns, describe_indexes, reset_schema, run_migrations,
    SqliteTicketRepository,
};
use sqlx::SqlitePool;
use uuid::Uuid;

struct TestContext {
    pool: SqlitePool,
    omc: SqliteTicketRepository,
    ocr: SqliteTicketRepository,
}

async fn setup_context() -> TestContext {
    let pool = fresh_pool().await;
    run_migrations(&pool).await.expect("failed migrations");

    TestContext {
        omc: SqliteTicketRepository::new(pool.clone(), TicketKind::Omc),
        ocr: SqliteTicketRepository::new(pool.clone(), TicketKind::Ocr),
        pool,
    }
}

async fn fresh_pool() -> SqlitePool {
    let db_path = temp_db_path();
    let database_url = format!("sqlite://{}", db_path.display());
    create_sqlite_pool(&database_url)
        .await
        .expect("failed to create pool")
}

fn temp_db_path() -> PathBuf {
    let filename = format!("parkonic-store-test-{}.db", Uuid::now_v7());
    std::env::temp_dir().join(filename)
}

fn at(hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, 1)
        .and_then(|d| d.and_hms_opt(hour, minute, 0))
        .expect("valid timestamp")
}

fn entry(camera_id: i32, plate: &str, entry_time: NaiveDateTime) -> TicketFields {
    TicketFields {
        camera_id: Some(camera_id),
        zone_name: Some("A1".into()),
        zone_region: Some("North".into()),
        plate_number: Some(plate.into()),
        plate_code: Some("DXB".into()),
        plate_city: Some("Dubai".into()),
        confidence: Some(92),
        entry_time: Some(entry_time),
        status: Some("open".into()),
        ..TicketFields::default()
    }
}

#[tokio::test]
async fn reset_schema_is_idempotent() {
    let pool = fresh_pool().await;

    reset_schema(&pool).await.expect("first reset");
    let mut once = Vec::new();
    for kind in TicketKind::ALL {
        let columns = describe_columns(&pool, kind).await.expect("columns");
        let indexes = describe_indexes(&pool, kind).await.expect("indexes");
        assert_eq!(columns.len(), 22, "{kind} columns");
        assert_eq!(indexes.len(), 4, "{kind} indexes");
        once.push((columns, indexes));
    }

    reset_schema(&pool).await.expect("second reset");
    for (kind, (columns_once, indexes_once)) in TicketKind::ALL.into_iter().zip(once) {
        let columns_twice = describe_columns(&pool, kind).await.expect("columns");
        let indexes_twice = describe_indexes(&pool, kind).await.expect("indexes");
        assert_eq!(columns_once, columns_twice, "{kind} columns changed");
        assert_eq!(indexes_once, indexes_twice, "{kind} indexes changed");
    }
}

#[tokio::test]
async fn migration_matches_rendered_schema() {
    let migrated = setup_context().await.pool;
    let rendered = fresh_pool().await;
    reset_schema(&rendered).await.expect("reset");

    for kind in TicketKind::ALL {
        assert_eq!(
            describe_columns(&migrated, kind).await.expect("columns"),
            describe_columns(&rendered, kind).await.expect("columns"),
            "column layout differs for {kind}"
        );
        assert_eq!(
            describe_indexes(&migrated, kind).await.expect("indexes"),
            describe_indexes(&rendered, kind).await.expect("indexes"),
            "index layout differs for {kind}"
        );
    }
}

#[tokio::test]
async fn declared_indexes_cover_lookup_columns() {
    let ctx = setup_context().await;

    for kind in TicketKind::ALL {
        let indexes = describe_indexes(&ctx.pool, kind).await.expect("indexes");
        let mut covered: Vec<Vec<String>> = indexes.iter().map(|i| i.columns.clone()).collect();
        covered.sort();

        let mut expected: Vec<Vec<String>> = vec![
            vec!["camera_id".into(), "entry_time".into()],
            vec!["plate_number".into(), "plate_code".into()],
            vec!["parkonic_trip_id".into()],
            vec!["zone_name".into(), "zone_region".into()],
        ];
        expected.sort();

        assert_eq!(covered, expected, "indexes for {kind}");
        assert!(indexes.iter().all(|index| !index.unique));
        assert!(indexes
            .iter()
            .all(|index| index.name.starts_with(kind.table_name())));
    }
}

#[tokio::test]
async fn both_tables_accept_an_empty_row() {
    let ctx = setup_context().await;

    for repo in [&ctx.omc, &ctx.ocr] {
        let ticket = repo
            .create(&TicketFields::default())
            .await
            .expect("insert empty ticket");
        assert_eq!(ticket.id, TicketId::new(1));
        assert_eq!(ticket.fields, TicketFields::default());

        let fetched = repo.get(ticket.id).await.expect("get").expect("present");
        assert_eq!(fetched.created_at, ticket.created_at);
    }
}

#[tokio::test]
async fn entry_after_exit_is_stored() {
    let ctx = setup_context().await;
    let fields = TicketFields {
        entry_time: Some(at(10, 0)),
        exit_time: Some(at(9, 0)),
        ..TicketFields::default()
    };

    let ticket = ctx.ocr.create(&fields).await.expect("inverted window accepted");
    let fetched = ctx.ocr.get(ticket.id).await.expect("get").expect("present");
    assert_eq!(fetched.fields.entry_time, Some(at(10, 0)));
    assert_eq!(fetched.fields.exit_time, Some(at(9, 0)));
}

#[tokio::test]
async fn ids_increase_and_are_not_reused() {
    let ctx = setup_context().await;

    let first = ctx.omc.create(&TicketFields::default()).await.expect("first");
    let second = ctx.omc.create(&TicketFields::default()).await.expect("second");
    assert!(second.id > first.id);

    ctx.omc.delete(second.id).await.expect("delete");
    let third = ctx.omc.create(&TicketFields::default()).await.expect("third");
    assert!(third.id > second.id);
}

#[tokio::test]
async fn tables_are_independent() {
    let ctx = setup_context().await;
    ctx.omc
        .create(&entry(201, "XYZ789", at(8, 0)))
        .await
        .expect("omc insert");

    assert_eq!(ctx.omc.count().await.expect("count"), 1);
    assert_eq!(ctx.ocr.count().await.expect("count"), 0);
    assert!(ctx.ocr.get(TicketId::new(1)).await.expect("get").is_none());
}

#[tokio::test]
async fn round_trips_every_column() {
    let ctx = setup_context().await;
    let fields = TicketFields {
        camera_id: Some(101),
        zone_name: Some("A1".into()),
        camera_ip: Some("192.168.0.10".into()),
        zone_region: Some("North".into()),
        spot_number: Some(12),
        plate_number: Some("ABC123".into()),
        plate_code: Some("DXB".into()),
        plate_city: Some("Dubai".into()),
        confidence: Some(92),
        entry_time: Some(at(8, 0)),
        exit_time: Some(at(9, 45)),
        status: Some("closed".into()),
        parkonic_trip_id: Some(5512),
        image_base64: Some("aGVsbG8=".into()),
        crop_image_path: Some("/tmp/crop.jpg".into()),
        entry_image_path: Some("/tmp/entry.jpg".into()),
        exit_image_path: Some("/tmp/exit.jpg".into()),
        exit_clip_path: Some("/tmp/exit.mp4".into()),
        process_time_in: Some(at(8, 1)),
        process_time_out: Some(at(9, 46)),
    };

    let created = ctx.ocr.create(&fields).await.expect("create");
    assert_eq!(created.fields, fields);
    let fetched = ctx.ocr.get(created.id).await.expect("get").expect("present");
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn update_replaces_columns() {
    let ctx = setup_context().await;
    let mut ticket = ctx
        .omc
        .create(&entry(201, "XYZ789", at(8, 0)))
        .await
        .expect("create");

    ticket.fields.exit_time = Some(at(11, 15));
    ticket.fields.status = Some("closed".into());
    ticket.fields.zone_region = None;
    ctx.omc.update(&ticket).await.expect("update");

    let fetched = ctx.omc.get(ticket.id).await.expect("get").expect("present");
    assert_eq!(fetched.fields.exit_time, Some(at(11, 15)));
    assert_eq!(fetched.fields.status.as_deref(), Some("closed"));
    assert_eq!(fetched.fields.zone_region, None);
    assert_eq!(fetched.created_at, ticket.created_at);
}

#[tokio::test]
async fn update_and_delete_missing_ticket_fail() {
    let ctx = setup_context().await;
    let ticket = ctx.omc.create(&TicketFields::default()).await.expect("create");
    ctx.omc.delete(ticket.id).await.expect("delete");

    let err = ctx.omc.update(&ticket).await.expect_err("update missing");
    assert!(matches!(err, CoreError::NotFound { entity: "omc_ticket", .. }));

    let err = ctx.omc.delete(ticket.id).await.expect_err("delete missing");
    assert!(matches!(err, CoreError::NotFound { .. }));
}

#[tokio::test]
async fn overlong_values_are_rejected() {
    let ctx = setup_context().await;
    let fields = TicketFields {
        camera_ip: Some("1".repeat(46)),
        ..TicketFields::default()
    };
    let err = ctx.ocr.create(&fields).await.expect_err("too long");
    assert!(matches!(err, CoreError::ValidationError(_)));
    assert_eq!(ctx.ocr.count().await.expect("count"), 0);
}

#[tokio::test]
async fn list_returns_newest_first_with_paging() {
    let ctx = setup_context().await;
    for minute in 0..5 {
        ctx.ocr
            .create(&entry(101, "ABC123", at(8, minute)))
            .await
            .expect("create");
    }

    let page = ctx.ocr.list(2, 0).await.expect("list");
    let ids: Vec<u32> = page.iter().map(|t| t.id.get()).collect();
    assert_eq!(ids, vec![5, 4]);

    let page = ctx.ocr.list(10, 3).await.expect("list");
    let ids: Vec<u32> = page.iter().map(|t| t.id.get()).collect();
    assert_eq!(ids, vec![2, 1]);
}

#[tokio::test]
async fn search_by_camera_and_entry_window() {
    let ctx = setup_context().await;
    ctx.ocr.create(&entry(101, "AAA111", at(7, 0))).await.expect("create");
    ctx.ocr.create(&entry(101, "BBB222", at(8, 0))).await.expect("create");
    ctx.ocr.create(&entry(101, "CCC333", at(9, 0))).await.expect("create");
    ctx.ocr.create(&entry(102, "DDD444", at(8, 0))).await.expect("create");

    let found = ctx
        .ocr
        .search(&TicketQuery::by_camera(101, Some(at(7, 30)), Some(at(9, 0))))
        .await
        .expect("search");
    let plates: Vec<_> = found
        .iter()
        .filter_map(|t| t.fields.plate_number.as_deref())
        .collect();
    assert_eq!(plates, vec!["BBB222", "CCC333"]);
}

#[tokio::test]
async fn search_by_plate_trip_and_zone() {
    let ctx = setup_context().await;
    let mut with_trip = entry(101, "ABC123", at(8, 0));
    with_trip.parkonic_trip_id = Some(77);
    ctx.omc.create(&with_trip).await.expect("create");

    let mut other_code = entry(101, "ABC123", at(9, 0));
    other_code.plate_code = Some("AUH".into());
    other_code.zone_name = Some("B2".into());
    ctx.omc.create(&other_code).await.expect("create");

    let by_plate = ctx
        .omc
        .search(&TicketQuery::by_plate("ABC123", None))
        .await
        .expect("search");
    assert_eq!(by_plate.len(), 2);

    let by_plate_code = ctx
        .omc
        .search(&TicketQuery::by_plate("ABC123", Some("AUH".into())))
        .await
        .expect("search");
    assert_eq!(by_plate_code.len(), 1);
    assert_eq!(by_plate_code[0].fields.zone_name.as_deref(), Some("B2"));

    let by_trip = ctx.omc.search(&TicketQuery::by_trip(77)).await.expect("search");
    assert_eq!(by_trip.len(), 1);
    assert_eq!(by_trip[0].fields.entry_time, Some(at(8, 0)));

    let by_zone = ctx
        .omc
        .search(&TicketQuery::by_zone("A1", Some("North".into())))
        .await
        .expect("search");
    assert_eq!(by_zone.len(), 1);

    let limited = ctx
        .omc
        .search(&TicketQuery::by_plate("ABC123", None).with_limit(1))
        .await
        .expect("search");
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].fields.entry_time, Some(at(8, 0)));
}

#[tokio::test]
async fn search_with_offset_only_skips_leading_rows() {
    let ctx = setup_context().await;
    for (minute, plate) in [(0, "AAA111"), (10, "BBB222"), (20, "CCC333")] {
        ctx.ocr
            .create(&entry(101, plate, at(8, minute)))
            .await
            .expect("create");
    }

    let query = TicketQuery {
        offset: Some(1),
        ..TicketQuery::by_camera(101, None, None)
    };
    let found = ctx.ocr.search(&query).await.expect("search");
    let plates: Vec<_> = found
        .iter()
        .filter_map(|t| t.fields.plate_number.as_deref())
        .collect();
    assert_eq!(plates, vec!["BBB222", "CCC333"]);
}

#[tokio::test]
async fn store_failures_name_the_table() {
    let ctx = setup_context().await;
    sqlx::query("DROP TABLE omc_ticket")
        .execute(&ctx.pool)
        .await
        .expect("drop");

    let err = ctx
        .omc
        .create(&TicketFields::default())
        .await
        .expect_err("missing table");
    match err {
        CoreError::Internal { message } => assert!(message.starts_with("omc_ticket: "), "{message}"),
        other => panic!("unexpected error {other:?}"),
    }
}
