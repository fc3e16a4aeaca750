//! Typed definition of the ticket tables.
//!
//! The same column and index list renders the MySQL dump that is shipped to
//! the production server and the DDL of the embedded SQLite store.

use chrono::NaiveDateTime;
use parkonic_core::{widths, CoreError, CoreResult, TicketKind};
use serde::Serialize;
use sqlx::{Row, SqlitePool};

/// Default name of the MySQL database holding both ticket tables.
pub const DEFAULT_DATABASE_NAME: &str = "parkonic_tickets";

/// Storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// Unsigned auto-increment primary key.
    Serial,
    Int,
    Varchar(usize),
    LongText,
    DateTime,
}

/// Default clause of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnDefault {
    /// No default clause.
    Unspecified,
    Null,
    CurrentTimestamp,
}

/// A ticket table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub ty: ColumnType,
    pub nullable: bool,
    pub default: ColumnDefault,
}

impl ColumnDef {
    const fn nullable(name: &'static str, ty: ColumnType) -> Self {
        Self {
            name,
            ty,
            nullable: true,
            default: ColumnDefault::Null,
        }
    }

    fn mysql(&self) -> String {
        let mut out = match self.ty {
            ColumnType::Serial => format!("`{}` int unsigned", self.name),
            ColumnType::Int => format!("`{}` int", self.name),
            ColumnType::Varchar(width) => format!("`{}` varchar({width})", self.name),
            ColumnType::LongText => format!("`{}` longtext", self.name),
            ColumnType::DateTime => format!("`{}` datetime", self.name),
        };
        if !self.nullable {
            out.push_str(" NOT NULL");
        }
        if self.ty == ColumnType::Serial {
            out.push_str(" AUTO_INCREMENT");
        }
        match self.default {
            ColumnDefault::Unspecified => {}
            ColumnDefault::Null => out.push_str(" DEFAULT NULL"),
            ColumnDefault::CurrentTimestamp => out.push_str(" DEFAULT CURRENT_TIMESTAMP"),
        }
        out
    }

    fn sqlite(&self) -> String {
        let declared = sqlite_declared_type(self.ty);
        if self.ty == ColumnType::Serial {
            return format!("{} {declared} PRIMARY KEY AUTOINCREMENT", self.name);
        }
        let mut out = format!("{} {declared}", self.name);
        if !self.nullable {
            out.push_str(" NOT NULL");
        }
        if self.default == ColumnDefault::CurrentTimestamp {
            out.push_str(" DEFAULT CURRENT_TIMESTAMP");
        }
        out
    }
}

/// Declared SQLite type for a column type.
#[must_use]
fn sqlite_declared_type(ty: ColumnType) -> String {
    match ty {
        ColumnType::Serial | ColumnType::Int => "INTEGER".to_string(),
        ColumnType::Varchar(width) => format!("VARCHAR({width})"),
        ColumnType::LongText => "TEXT".to_string(),
        ColumnType::DateTime => "DATETIME".to_string(),
    }
}

/// A secondary (non-unique) index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexDef {
    pub name: &'static str,
    pub columns: &'static [&'static str],
}

impl IndexDef {
    /// SQLite index names share one namespace, so they carry the table name.
    #[must_use]
    pub fn sqlite_name(&self, kind: TicketKind) -> String {
        format!("{}_{}", kind.table_name(), self.name)
    }
}

/// Columns shared by `omc_ticket` and `ocr_ticket`, in table order.
pub const TICKET_COLUMNS: &[ColumnDef] = &[
    ColumnDef {
        name: "id",
        ty: ColumnType::Serial,
        nullable: false,
        default: ColumnDefault::Unspecified,
    },
    ColumnDef::nullable("camera_id", ColumnType::Int),
    ColumnDef::nullable("zone_name", ColumnType::Varchar(widths::ZONE_NAME)),
    ColumnDef::nullable("camera_ip", ColumnType::Varchar(widths::CAMERA_IP)),
    ColumnDef::nullable("zone_region", ColumnType::Varchar(widths::ZONE_REGION)),
    ColumnDef::nullable("spot_number", ColumnType::Int),
    ColumnDef::nullable("plate_number", ColumnType::Varchar(widths::PLATE_NUMBER)),
    ColumnDef::nullable("plate_code", ColumnType::Varchar(widths::PLATE_CODE)),
    ColumnDef::nullable("plate_city", ColumnType::Varchar(widths::PLATE_CITY)),
    ColumnDef::nullable("confidence", ColumnType::Int),
    ColumnDef::nullable("entry_time", ColumnType::DateTime),
    ColumnDef::nullable("exit_time", ColumnType::DateTime),
    ColumnDef::nullable("status", ColumnType::Varchar(widths::STATUS)),
    ColumnDef::nullable("parkonic_trip_id", ColumnType::Int),
    ColumnDef {
        name: "image_base64",
        ty: ColumnType::LongText,
        nullable: true,
        default: ColumnDefault::Unspecified,
    },
    ColumnDef::nullable("crop_image_path", ColumnType::Varchar(widths::PATH)),
    ColumnDef::nullable("entry_image_path", ColumnType::Varchar(widths::PATH)),
    ColumnDef::nullable("exit_image_path", ColumnType::Varchar(widths::PATH)),
    ColumnDef::nullable("exit_clip_path", ColumnType::Varchar(widths::PATH)),
    ColumnDef {
        name: "created_at",
        ty: ColumnType::DateTime,
        nullable: false,
        default: ColumnDefault::CurrentTimestamp,
    },
    ColumnDef::nullable("process_time_in", ColumnType::DateTime),
    ColumnDef::nullable("process_time_out", ColumnType::DateTime),
];

/// Secondary indexes shared by both tables.
pub const TICKET_INDEXES: &[IndexDef] = &[
    IndexDef {
        name: "idx_camera_time",
        columns: &["camera_id", "entry_time"],
    },
    IndexDef {
        name: "idx_plate",
        columns: &["plate_number", "plate_code"],
    },
    IndexDef {
        name: "idx_trip",
        columns: &["parkonic_trip_id"],
    },
    IndexDef {
        name: "idx_zone",
        columns: &["zone_name", "zone_region"],
    },
];

/// Comma-separated column list in table order.
#[must_use]
pub fn column_list() -> String {
    TICKET_COLUMNS
        .iter()
        .map(|column| column.name)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Renders the MySQL `CREATE TABLE` statement for one ticket table.
#[must_use]
pub fn mysql_create_table(kind: TicketKind) -> String {
    let mut lines: Vec<String> = TICKET_COLUMNS.iter().map(ColumnDef::mysql).collect();
    lines.push("PRIMARY KEY (`id`)".to_string());
    for index in TICKET_INDEXES {
        let columns = index
            .columns
            .iter()
            .map(|column| format!("`{column}`"))
            .collect::<Vec<_>>()
            .join(",");
        lines.push(format!("KEY `{}` ({columns})", index.name));
    }

    let body = lines
        .iter()
        .map(|line| format!("  {line}"))
        .collect::<Vec<_>>()
        .join(",\n");

    format!(
        "CREATE TABLE `{}` (\n{body}\n) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci;",
        kind.table_name()
    )
}

const DUMP_SESSION_PREAMBLE: &str = "\
/*!40101 SET @OLD_CHARACTER_SET_CLIENT=@@CHARACTER_SET_CLIENT */;
/*!40101 SET @OLD_CHARACTER_SET_RESULTS=@@CHARACTER_SET_RESULTS */;
/*!40101 SET @OLD_COLLATION_CONNECTION=@@COLLATION_CONNECTION */;
/*!50503 SET NAMES utf8 */;
/*!40103 SET @OLD_TIME_ZONE=@@TIME_ZONE */;
/*!40103 SET TIME_ZONE='+00:00' */;
/*!40014 SET @OLD_UNIQUE_CHECKS=@@UNIQUE_CHECKS, UNIQUE_CHECKS=0 */;
/*!40014 SET @OLD_FOREIGN_KEY_CHECKS=@@FOREIGN_KEY_CHECKS, FOREIGN_KEY_CHECKS=0 */;
/*!40101 SET @OLD_SQL_MODE=@@SQL_MODE, SQL_MODE='NO_AUTO_VALUE_ON_ZERO' */;
/*!40111 SET @OLD_SQL_NOTES=@@SQL_NOTES, SQL_NOTES=0 */;
";

const DUMP_SESSION_EPILOGUE: &str = "\
/*!40103 SET TIME_ZONE=@OLD_TIME_ZONE */;

/*!40101 SET SQL_MODE=@OLD_SQL_MODE */;
/*!40014 SET FOREIGN_KEY_CHECKS=@OLD_FOREIGN_KEY_CHECKS */;
/*!40014 SET UNIQUE_CHECKS=@OLD_UNIQUE_CHECKS */;
/*!40101 SET CHARACTER_SET_CLIENT=@OLD_CHARACTER_SET_CLIENT */;
/*!40101 SET CHARACTER_SET_RESULTS=@OLD_CHARACTER_SET_RESULTS */;
/*!40101 SET COLLATION_CONNECTION=@OLD_COLLATION_CONNECTION */;
/*!40111 SET SQL_NOTES=@OLD_SQL_NOTES */;
";

/// Renders a mysqldump-style script that (re)creates the database and both
/// ticket tables.
///
/// Every `CREATE TABLE` is preceded by `DROP TABLE IF EXISTS`, so replaying
/// the script converges on the same schema.
#[must_use]
pub fn mysql_dump(database: &str, generated_at: NaiveDateTime) -> String {
    let mut dump = String::new();
    dump.push_str("-- MySQL dump 10.13  Distrib 8.0.xx, for Win64 (x86_64)\n");
    dump.push_str("--\n");
    dump.push_str(&format!("-- Host: localhost    Database: {database}\n"));
    dump.push_str("-- ------------------------------------------------------\n");
    dump.push_str("-- Server version\t8.0.xx\n\n");
    dump.push_str(DUMP_SESSION_PREAMBLE);
    dump.push_str("\n--\n");
    dump.push_str(&format!("-- Database structure for database `{database}`\n"));
    dump.push_str("--\n\n");
    dump.push_str(&format!("CREATE DATABASE IF NOT EXISTS `{database}`\n"));
    dump.push_str("  CHARACTER SET utf8mb4\n");
    dump.push_str("  COLLATE utf8mb4_unicode_ci;\n\n");
    dump.push_str(&format!("USE `{database}`;\n"));

    for kind in TicketKind::ALL {
        let table = kind.table_name();
        dump.push_str("\n--\n");
        dump.push_str(&format!("-- Table structure for table `{table}`\n"));
        dump.push_str("--\n\n");
        dump.push_str(&format!("DROP TABLE IF EXISTS `{table}`;\n\n"));
        dump.push_str("/*!40101 SET @saved_cs_client     = @@character_set_client */;\n");
        dump.push_str("/*!50503 SET character_set_client = utf8mb4 */;\n");
        dump.push_str(&mysql_create_table(kind));
        dump.push('\n');
        dump.push_str("/*!40101 SET character_set_client = @saved_cs_client */;\n");
    }

    dump.push('\n');
    dump.push_str(DUMP_SESSION_EPILOGUE);
    dump.push_str(&format!(
        "\n-- Dump completed on {}\n",
        generated_at.format("%Y-%m-%d %H:%M:%S")
    ));
    dump
}

/// `CREATE TABLE IF NOT EXISTS` and `CREATE INDEX IF NOT EXISTS` statements
/// for the embedded store.
#[must_use]
pub fn sqlite_statements(kind: TicketKind) -> Vec<String> {
    let table = kind.table_name();
    let columns = TICKET_COLUMNS
        .iter()
        .map(|column| format!("    {}", column.sqlite()))
        .collect::<Vec<_>>()
        .join(",\n");

    let mut statements = vec![format!("CREATE TABLE IF NOT EXISTS {table} (\n{columns}\n)")];
    statements.extend(TICKET_INDEXES.iter().map(|index| {
        format!(
            "CREATE INDEX IF NOT EXISTS {} ON {table} ({})",
            index.sqlite_name(kind),
            index.columns.join(", ")
        )
    }));
    statements
}

/// Drops and recreates both ticket tables in a single transaction.
///
/// All stored tickets are lost. Applying it repeatedly leaves the same schema.
pub async fn reset_schema(pool: &SqlitePool) -> CoreResult<()> {
    let mut tx = pool.begin().await.map_err(internal)?;
    for kind in TicketKind::ALL {
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", kind.table_name()))
            .execute(&mut *tx)
            .await
            .map_err(internal)?;
        for statement in sqlite_statements(kind) {
            sqlx::query(&statement)
                .execute(&mut *tx)
                .await
                .map_err(internal)?;
        }
    }
    tx.commit().await.map_err(internal)?;
    tracing::info!("ticket tables dropped and recreated");
    Ok(())
}

/// A column as reported by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub declared_type: String,
    pub not_null: bool,
    pub default: Option<String>,
    pub primary_key: bool,
}

/// A secondary index as reported by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexInfo {
    pub name: String,
    pub unique: bool,
    pub columns: Vec<String>,
}

/// Lists the stored columns of a ticket table in table order.
pub async fn describe_columns(pool: &SqlitePool, kind: TicketKind) -> CoreResult<Vec<ColumnInfo>> {
    let rows = sqlx::query(&format!("PRAGMA table_info({})", kind.table_name()))
        .fetch_all(pool)
        .await
        .map_err(internal)?;

    rows.into_iter()
        .map(|row| {
            let not_null: i64 = row.try_get("notnull").map_err(internal)?;
            let pk: i64 = row.try_get("pk").map_err(internal)?;
            Ok(ColumnInfo {
                name: row.try_get("name").map_err(internal)?,
                declared_type: row.try_get("type").map_err(internal)?,
                not_null: not_null != 0,
                default: row.try_get("dflt_value").map_err(internal)?,
                primary_key: pk != 0,
            })
        })
        .collect()
}

/// Lists the explicitly created indexes of a ticket table, sorted by name.
pub async fn describe_indexes(pool: &SqlitePool, kind: TicketKind) -> CoreResult<Vec<IndexInfo>> {
    let index_rows = sqlx::query(&format!("PRAGMA index_list({})", kind.table_name()))
        .fetch_all(pool)
        .await
        .map_err(internal)?;

    let mut indexes = Vec::new();
    for row in index_rows {
        let origin: String = row.try_get("origin").map_err(internal)?;
        if origin != "c" {
            continue;
        }
        let name: String = row.try_get("name").map_err(internal)?;
        let unique: i64 = row.try_get("unique").map_err(internal)?;

        let column_rows = sqlx::query(&format!("PRAGMA index_info(\"{name}\")"))
            .fetch_all(pool)
            .await
            .map_err(internal)?;
        let mut columns: Vec<(i64, String)> = column_rows
            .into_iter()
            .map(|col| -> Result<(i64, String), sqlx::Error> {
                Ok((col.try_get("seqno")?, col.try_get("name")?))
            })
            .collect::<Result<_, sqlx::Error>>()
            .map_err(internal)?;
        columns.sort_by_key(|(seqno, _)| *seqno);

        indexes.push(IndexInfo {
            name,
            unique: unique != 0,
            columns: columns.into_iter().map(|(_, column)| column).collect(),
        });
    }
    indexes.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(indexes)
}

fn internal(err: sqlx::Error) -> CoreError {
    CoreError::internal(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn mysql_table_matches_published_layout() {
        let ddl = mysql_create_table(TicketKind::Omc);
        assert!(ddl.starts_with("CREATE TABLE `omc_ticket` (\n  `id` int unsigned NOT NULL AUTO_INCREMENT,\n"));
        assert!(ddl.contains("  `camera_ip` varchar(45) DEFAULT NULL,\n"));
        assert!(ddl.contains("  `image_base64` longtext,\n"));
        assert!(ddl.contains("  `created_at` datetime NOT NULL DEFAULT CURRENT_TIMESTAMP,\n"));
        assert!(ddl.contains("  PRIMARY KEY (`id`),\n"));
        assert!(ddl.contains("  KEY `idx_camera_time` (`camera_id`,`entry_time`),\n"));
        assert!(ddl.contains("  KEY `idx_zone` (`zone_name`,`zone_region`)\n"));
        assert!(ddl.ends_with(") ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci;"));
    }

    #[test]
    fn dump_drops_before_every_create() {
        let generated_at = NaiveDate::from_ymd_opt(2024, 5, 1)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .unwrap();
        let dump = mysql_dump(DEFAULT_DATABASE_NAME, generated_at);

        assert!(dump.contains("CREATE DATABASE IF NOT EXISTS `parkonic_tickets`\n  CHARACTER SET utf8mb4\n  COLLATE utf8mb4_unicode_ci;"));
        assert!(dump.contains("USE `parkonic_tickets`;"));
        for table in ["omc_ticket", "ocr_ticket"] {
            let drop = dump
                .find(&format!("DROP TABLE IF EXISTS `{table}`;"))
                .unwrap();
            let create = dump.find(&format!("CREATE TABLE `{table}`")).unwrap();
            assert!(drop < create);
        }
        assert!(dump.find("`omc_ticket` (").unwrap() < dump.find("`ocr_ticket` (").unwrap());
        assert_eq!(dump.matches("ENGINE=InnoDB").count(), 2);
        assert_eq!(dump.matches("KEY `idx_").count(), 8);
        assert!(dump.ends_with("-- Dump completed on 2024-05-01 12:00:00\n"));
    }

    #[test]
    fn sqlite_indexes_are_table_scoped() {
        let statements = sqlite_statements(TicketKind::Ocr);
        assert_eq!(statements.len(), 1 + TICKET_INDEXES.len());
        assert!(statements[0].contains("id INTEGER PRIMARY KEY AUTOINCREMENT"));
        assert!(statements[0].contains("created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP"));
        assert!(statements.contains(
            &"CREATE INDEX IF NOT EXISTS ocr_ticket_idx_plate ON ocr_ticket (plate_number, plate_code)"
                .to_string()
        ));
    }

    #[test]
    fn column_list_follows_table_order() {
        let list = column_list();
        assert!(list.starts_with("id, camera_id, zone_name"));
        assert!(list.ends_with("created_at, process_time_in, process_time_out"));
    }
}
