#![allow(clippy::unwrap_used, clippy::expect_used)]
#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use larder_db::query::ColumnPath;
use larder_db::{
    AggregateRecord, ChildTable, Children, Column, DbConfig, DeletePolicy, EntityDescriptor,
    EntityMapper, FieldKind, FilterMapper, FilterMapping, GenericRepository, JoinSpec, LimitCfg,
    MappingError, RecordRow,
};
use sea_orm::{ConnectionTrait, DatabaseConnection};
use uuid::Uuid;

/// Small aggregate: a note with an ordered list of labels.
#[derive(Clone, Debug, PartialEq)]
pub struct Note {
    pub id: Uuid,
    pub title: String,
    pub pages: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub labels: Vec<String>,
    pub version: i64,
}

impl Note {
    pub fn new(title: &str, pages: Option<i64>, labels: &[&str]) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.to_owned(),
            pages,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
            labels: labels.iter().map(|l| (*l).to_owned()).collect(),
            version: 1,
        }
    }
}

const COLUMNS: &[Column] = &[
    Column::new("id", FieldKind::Uuid),
    Column::new("title", FieldKind::String),
    Column::new("pages", FieldKind::I64),
    Column::new("created_at", FieldKind::DateTimeUtc),
];

const LABEL_ROWS: ChildTable = ChildTable {
    table: "note_labels",
    foreign_key: "note_id",
    columns: &[
        Column::new("position", FieldKind::I64),
        Column::new("name", FieldKind::String),
    ],
    order_by: &["position"],
};

const LAYOUT: EntityDescriptor = EntityDescriptor {
    table: "notes",
    primary_key: "id",
    version_column: "version",
    columns: COLUMNS,
    children: &[LABEL_ROWS],
    delete_policy: DeletePolicy::Hard,
};

pub static NOTES: EntityDescriptor = LAYOUT;

pub static ARCHIVED_NOTES: EntityDescriptor = EntityDescriptor {
    delete_policy: DeletePolicy::Soft {
        column: "deleted_at",
    },
    ..LAYOUT
};

pub struct NoteMapper {
    pub descriptor: &'static EntityDescriptor,
}

impl EntityMapper for NoteMapper {
    type Aggregate = Note;

    fn descriptor(&self) -> &'static EntityDescriptor {
        self.descriptor
    }

    fn to_record(&self, note: &Note) -> Result<AggregateRecord, MappingError> {
        let root = RecordRow::new("notes")
            .with("id", note.id)
            .with("title", note.title.as_str())
            .with("pages", note.pages)
            .with("created_at", note.created_at);
        Ok(AggregateRecord::new(root, note.version))
    }

    fn to_children(&self, note: &Note) -> Result<Children, MappingError> {
        let mut children = Children::new();
        for (position, name) in (0_i64..).zip(&note.labels) {
            children.push(
                RecordRow::new(LABEL_ROWS.table)
                    .with("note_id", note.id)
                    .with("position", position)
                    .with("name", name.as_str()),
            );
        }
        Ok(children)
    }

    fn to_aggregate(
        &self,
        record: AggregateRecord,
        mut children: Children,
    ) -> Result<Note, MappingError> {
        let id = record.id(self.descriptor)?;
        let labels = children
            .take(&LABEL_ROWS, id)?
            .iter()
            .map(|row| row.get::<String>("name"))
            .collect::<Result<_, _>>()?;
        Ok(Note {
            id,
            title: record.root.get("title")?,
            pages: record.root.get_opt("pages")?,
            created_at: record.root.get("created_at")?,
            labels,
            version: record.version,
        })
    }
}

const LABELS: JoinSpec =
    JoinSpec::one_to_many("labels", "note_labels", ColumnPath::root("id"), "note_id");

pub fn note_filters() -> Arc<FilterMapper> {
    let mapper = FilterMapper::builder("notes", "id")
        .insert(FilterMapping::column("id", "id", FieldKind::Uuid).unique())
        .insert(FilterMapping::column("title", "title", FieldKind::String))
        .insert(
            FilterMapping::column("pages", "pages", FieldKind::I64)
                .nullable()
                .repeatable(),
        )
        .insert(FilterMapping::column("created_at", "created_at", FieldKind::DateTimeUtc))
        .insert(FilterMapping::column("label", "name", FieldKind::String).through(LABELS))
        .build()
        .unwrap();
    Arc::new(mapper)
}

pub const LIMITS: LimitCfg = LimitCfg {
    default: 25,
    max: 100,
};

pub fn repository(descriptor: &'static EntityDescriptor) -> GenericRepository<NoteMapper> {
    GenericRepository::new(NoteMapper { descriptor }, note_filters(), LIMITS).unwrap()
}

pub async fn connect() -> DatabaseConnection {
    DbConfig::default().connect().await.expect("connect sqlite")
}

pub async fn create_schema(db: &DatabaseConnection) {
    db.execute_unprepared(
        "CREATE TABLE notes (
            id BLOB PRIMARY KEY NOT NULL,
            title TEXT NOT NULL,
            pages INTEGER,
            created_at TEXT NOT NULL,
            deleted_at TEXT,
            version INTEGER NOT NULL
        );
        CREATE TABLE note_labels (
            note_id BLOB NOT NULL REFERENCES notes(id),
            position INTEGER NOT NULL,
            name TEXT NOT NULL
        );",
    )
    .await
    .expect("create schema");
}

/// Connected database with the note schema.
pub async fn setup() -> DatabaseConnection {
    let db = connect().await;
    create_schema(&db).await;
    db
}
