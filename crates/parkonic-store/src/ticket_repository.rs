use chrono::NaiveDateTime;
use parkonic_core::{
    CoreError, CoreResult, Ticket, TicketFields, TicketId, TicketKind, TicketQuery,
};
use sqlx::sqlite::SqliteRow;
use sqlx::{query, query_scalar, Executor, QueryBuilder, Row, Sqlite, SqlitePool};

use crate::schema::column_list;

/// SQLite-backed repository for one ticket table.
pub struct SqliteTicketRepository {
    pool: SqlitePool,
    kind: TicketKind,
}

impl SqliteTicketRepository {
    /// Creates a repository for the table selected by `kind`.
    pub fn new(pool: SqlitePool, kind: TicketKind) -> Self {
        Self { pool, kind }
    }

    /// Inserts a ticket via the supplied executor and returns the stored row.
    pub async fn create_with_executor<'e, E>(
        executor: E,
        kind: TicketKind,
        fields: &TicketFields,
    ) -> CoreResult<Ticket>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        fields.validate()?;

        let sql = format!(
            r#"
            INSERT INTO {table} (
                camera_id,
                zone_name,
                camera_ip,
                zone_region,
                spot_number,
                plate_number,
                plate_code,
                plate_city,
                confidence,
                entry_time,
                exit_time,
                status,
                parkonic_trip_id,
                image_base64,
                crop_image_path,
                entry_image_path,
                exit_image_path,
                exit_clip_path,
                process_time_in,
                process_time_out
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)
            RETURNING {columns}
            "#,
            table = kind.table_name(),
            columns = column_list(),
        );

        let row = query(&sql)
            .bind(fields.camera_id)
            .bind(fields.zone_name.as_deref())
            .bind(fields.camera_ip.as_deref())
            .bind(fields.zone_region.as_deref())
            .bind(fields.spot_number)
            .bind(fields.plate_number.as_deref())
            .bind(fields.plate_code.as_deref())
            .bind(fields.plate_city.as_deref())
            .bind(fields.confidence)
            .bind(fields.entry_time)
            .bind(fields.exit_time)
            .bind(fields.status.as_deref())
            .bind(fields.parkonic_trip_id)
            .bind(fields.image_base64.as_deref())
            .bind(fields.crop_image_path.as_deref())
            .bind(fields.entry_image_path.as_deref())
            .bind(fields.exit_image_path.as_deref())
            .bind(fields.exit_clip_path.as_deref())
            .bind(fields.process_time_in)
            .bind(fields.process_time_out)
            .fetch_one(executor)
            .await
            .map_err(|err| map_sqlx_error(kind.table_name(), err))?;

        Self::map_row(row)
    }

    /// Replaces every column of an existing ticket via the supplied executor.
    pub async fn update_with_executor<'e, E>(
        executor: E,
        kind: TicketKind,
        ticket: &Ticket,
    ) -> CoreResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let fields = &ticket.fields;
        fields.validate()?;

        let sql = format!(
            r#"
            UPDATE {table}
               SET camera_id = ?2,
                   zone_name = ?3,
                   camera_ip = ?4,
                   zone_region = ?5,
                   spot_number = ?6,
                   plate_number = ?7,
                   plate_code = ?8,
                   plate_city = ?9,
                   confidence = ?10,
                   entry_time = ?11,
                   exit_time = ?12,
                   status = ?13,
                   parkonic_trip_id = ?14,
                   image_base64 = ?15,
                   crop_image_path = ?16,
                   entry_image_path = ?17,
                   exit_image_path = ?18,
                   exit_clip_path = ?19,
                   process_time_in = ?20,
                   process_time_out = ?21
             WHERE id = ?1
            "#,
            table = kind.table_name(),
        );

        let result = query(&sql)
            .bind(i64::from(ticket.id.get()))
            .bind(fields.camera_id)
            .bind(fields.zone_name.as_deref())
            .bind(fields.camera_ip.as_deref())
            .bind(fields.zone_region.as_deref())
            .bind(fields.spot_number)
            .bind(fields.plate_number.as_deref())
            .bind(fields.plate_code.as_deref())
            .bind(fields.plate_city.as_deref())
            .bind(fields.confidence)
            .bind(fields.entry_time)
            .bind(fields.exit_time)
            .bind(fields.status.as_deref())
            .bind(fields.parkonic_trip_id)
            .bind(fields.image_base64.as_deref())
            .bind(fields.crop_image_path.as_deref())
            .bind(fields.entry_image_path.as_deref())
            .bind(fields.exit_image_path.as_deref())
            .bind(fields.exit_clip_path.as_deref())
            .bind(fields.process_time_in)
            .bind(fields.process_time_out)
            .execute(executor)
            .await
            .map_err(|err| map_sqlx_error(kind.table_name(), err))?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found(kind.table_name(), ticket.id.to_string()));
        }
        Ok(())
    }

    /// Deletes a ticket via the supplied executor.
    pub async fn delete_with_executor<'e, E>(
        executor: E,
        kind: TicketKind,
        id: TicketId,
    ) -> CoreResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!("DELETE FROM {} WHERE id = ?1", kind.table_name());
        let result = query(&sql)
            .bind(i64::from(id.get()))
            .execute(executor)
            .await
            .map_err(|err| map_sqlx_error(kind.table_name(), err))?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found(kind.table_name(), id.to_string()));
        }
        Ok(())
    }

    fn map_row(row: SqliteRow) -> CoreResult<Ticket> {
        let id: i64 = decode(&row, "id")?;
        let id = u32::try_from(id)
            .map_err(|_| CoreError::invalid_state(format!("ticket id {id} outside unsigned 32-bit range")))?;

        Ok(Ticket {
            id: TicketId::new(id),
            fields: TicketFields {
                camera_id: decode_int(&row, "camera_id")?,
                zone_name: decode(&row, "zone_name")?,
                camera_ip: decode(&row, "camera_ip")?,
                zone_region: decode(&row, "zone_region")?,
                spot_number: decode_int(&row, "spot_number")?,
                plate_number: decode(&row, "plate_number")?,
                plate_code: decode(&row, "plate_code")?,
                plate_city: decode(&row, "plate_city")?,
                confidence: decode_int(&row, "confidence")?,
                entry_time: decode(&row, "entry_time")?,
                exit_time: decode(&row, "exit_time")?,
                status: decode(&row, "status")?,
                parkonic_trip_id: decode_int(&row, "parkonic_trip_id")?,
                image_base64: decode(&row, "image_base64")?,
                crop_image_path: decode(&row, "crop_image_path")?,
                entry_image_path: decode(&row, "entry_image_path")?,
                exit_image_path: decode(&row, "exit_image_path")?,
                exit_clip_path: decode(&row, "exit_clip_path")?,
                process_time_in: decode(&row, "process_time_in")?,
                process_time_out: decode(&row, "process_time_out")?,
            },
            created_at: decode::<NaiveDateTime>(&row, "created_at")?,
        })
    }
}

#[async_trait::async_trait]
impl parkonic_core::TicketRepository for SqliteTicketRepository {
    fn kind(&self) -> TicketKind {
        self.kind
    }

    async fn create(&self, fields: &TicketFields) -> CoreResult<Ticket> {
        Self::create_with_executor(&self.pool, self.kind, fields).await
    }

    async fn get(&self, id: TicketId) -> CoreResult<Option<Ticket>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = ?1",
            column_list(),
            self.kind.table_name()
        );
        let row = query(&sql)
            .bind(i64::from(id.get()))
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| CoreError::internal(err.to_string()))?;

        row.map(Self::map_row).transpose()
    }

    async fn list(&self, limit: u32, offset: u32) -> CoreResult<Vec<Ticket>> {
        let sql = format!(
            r#"
            SELECT {}
              FROM {}
          ORDER BY created_at DESC, id DESC
             LIMIT ?1 OFFSET ?2
            "#,
            column_list(),
            self.kind.table_name()
        );
        let rows = query(&sql)
            .bind(i64::from(limit))
            .bind(i64::from(offset))
            .fetch_all(&self.pool)
            .await
            .map_err(|err| CoreError::internal(err.to_string()))?;

        rows.into_iter().map(Self::map_row).collect()
    }

    async fn search(&self, filter: &TicketQuery) -> CoreResult<Vec<Ticket>> {
        let mut builder: QueryBuilder<'_, Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM {} WHERE 1 = 1",
            column_list(),
            self.kind.table_name()
        ));

        if let Some(camera_id) = filter.camera_id {
            builder.push(" AND camera_id = ").push_bind(camera_id);
        }
        if let Some(plate_number) = &filter.plate_number {
            builder.push(" AND plate_number = ").push_bind(plate_number.clone());
        }
        if let Some(plate_code) = &filter.plate_code {
            builder.push(" AND plate_code = ").push_bind(plate_code.clone());
        }
        if let Some(trip_id) = filter.parkonic_trip_id {
            builder.push(" AND parkonic_trip_id = ").push_bind(trip_id);
        }
        if let Some(zone_name) = &filter.zone_name {
            builder.push(" AND zone_name = ").push_bind(zone_name.clone());
        }
        if let Some(zone_region) = &filter.zone_region {
            builder.push(" AND zone_region = ").push_bind(zone_region.clone());
        }
        if let Some(status) = &filter.status {
            builder.push(" AND status = ").push_bind(status.clone());
        }
        if let Some(from) = filter.entered_from {
            builder.push(" AND entry_time >= ").push_bind(from);
        }
        if let Some(until) = filter.entered_until {
            builder.push(" AND entry_time <= ").push_bind(until);
        }

        builder.push(" ORDER BY entry_time ASC, id ASC");
        match (filter.limit, filter.offset) {
            (Some(limit), offset) => {
                builder.push(" LIMIT ").push_bind(i64::from(limit));
                if let Some(offset) = offset {
                    builder.push(" OFFSET ").push_bind(i64::from(offset));
                }
            }
            (None, Some(offset)) => {
                builder.push(" LIMIT -1 OFFSET ").push_bind(i64::from(offset));
            }
            (None, None) => {}
        }

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|err| CoreError::internal(err.to_string()))?;

        rows.into_iter().map(Self::map_row).collect()
    }

    async fn update(&self, ticket: &Ticket) -> CoreResult<()> {
        Self::update_with_executor(&self.pool, self.kind, ticket).await
    }

    async fn delete(&self, id: TicketId) -> CoreResult<()> {
        Self::delete_with_executor(&self.pool, self.kind, id).await
    }

    async fn count(&self) -> CoreResult<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", self.kind.table_name());
        let count: i64 = query_scalar(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|err| CoreError::internal(err.to_string()))?;
        u64::try_from(count).map_err(|_| CoreError::invalid_state("negative row count"))
    }
}

fn decode<'r, T>(row: &'r SqliteRow, column: &str) -> CoreResult<T>
where
    T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    row.try_get(column)
        .map_err(|err| CoreError::internal(format!("failed to decode {column}: {err}")))
}

fn decode_int(row: &SqliteRow, column: &str) -> CoreResult<Option<i32>> {
    let value: Option<i64> = decode(row, column)?;
    value
        .map(|raw| {
            i32::try_from(raw).map_err(|_| {
                CoreError::invalid_state(format!("{column} value {raw} exceeds 32-bit range"))
            })
        })
        .transpose()
}

fn map_sqlx_error(table: &'static str, err: sqlx::Error) -> CoreError {
    match err {
        sqlx::Error::Database(db_err) => CoreError::internal(format!("{table}: {}", db_err.message())),
        other => CoreError::internal(format!("{table}: {other}")),
    }
}
