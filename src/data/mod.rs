/// Data layer: core types, loading, schema resolution, filtering and
/// aggregation.
///
/// Architecture:
/// ```text
///  .csv / .tsv / .json / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file, normalize column names
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  schema   │  ordered rules → canonical fields, rename columns
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  Dataset  │  Vec<Record>, column index, SchemaMapping (cached)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  category / threshold / year / country predicates
///   └──────────┘
///        │
///        ▼
///   ┌───────────┐
///   │ aggregate │  group by country → mean of metric
///   └───────────┘
/// ```

pub mod aggregate;
pub mod cache;
pub mod filter;
pub mod loader;
pub mod model;
pub mod schema;
pub mod views;
