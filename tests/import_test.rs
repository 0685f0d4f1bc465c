use atlas_import::config::ImportConfig;
use atlas_import::datasets::run;
use atlas_import::error::ImportError;
use atlas_import::models::{ClassificationModel, ModelTable};
use atlas_import::pl_sql::*;
use polars::prelude::*;
use std::fs;
use std::num::NonZeroUsize;
use std::path::Path;

fn write_fixture(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_build_schema() {
    let df = df!(
        "department_id" => [1i64, 2],
        "eci" => [0.5, 0.7],
        "department" => ["05", "08"],
    )
    .unwrap();
    let mut schema = SqliteSchema::from_polars_schema(df.schema());
    schema.with_column(
        "department_id",
        SqliteColOption::default()
            .with_type_sql(SqliteDataType::INTEGER)
            .with_nullable(false),
    );
    let qry = schema.finish("department_year");
    assert_eq!(
        "CREATE TABLE IF NOT EXISTS department_year (\n    department_id INTEGER NOT NULL,\n    eci REAL,\n    department TEXT\n);",
        qry
    );
}

#[test]
fn test_pl_to_sql_appends() -> Result<(), ImportError> {
    let dir = tempfile::tempdir()?;
    let db = Database::open(dir.path().join("test.db"))?;
    let df = df!(
        "product_id" => [Some(1i64), Some(2), None],
        "year" => [1998i64, 1998, 1999],
        "pci" => [Some(0.5), Some(f64::NAN), None],
        "name" => ["Cars", "Farmer's goods", "Trucks"],
    )?;
    let writer = SqlWriter::new(&db, "product_year")
        .with_batch_size(NonZeroUsize::new(2).unwrap());
    assert_eq!(3, writer.finish(&df)?);
    assert_eq!(3, db.count_rows("product_year")?);
    writer.finish(&df)?;
    assert_eq!(6, db.count_rows("product_year")?);

    let (nulls,): (i64,) = db.block_on(
        sqlx::query_as("SELECT COUNT(*) FROM product_year WHERE pci IS NULL").fetch_one(db.pool()),
    )?;
    assert_eq!(4, nulls);
    let names: Vec<(String,)> = db.block_on(
        sqlx::query_as("SELECT name FROM product_year WHERE year = 1998 ORDER BY product_id")
            .fetch_all(db.pool()),
    )?;
    assert_eq!("Farmer's goods", names[1].0);
    Ok(())
}

#[test]
fn test_pl_to_sql_creates_once() -> Result<(), ImportError> {
    let dir = tempfile::tempdir()?;
    let db = Database::open(dir.path().join("test.db"))?;
    let df = df!("year" => [2010i64, 2011])?;
    let writer = SqlWriter::new(&db, "years");
    writer.finish(&df)?;
    writer.finish(&df.head(Some(1)))?;
    assert_eq!(3, db.count_rows("years")?);
    let empty = df.clear();
    assert_eq!(0, SqlWriter::new(&db, "no_rows").finish(&empty)?);
    assert_eq!(0, db.count_rows("no_rows")?);
    Ok(())
}

#[test]
fn test_add_all_models() -> Result<(), ImportError> {
    let dir = tempfile::tempdir()?;
    let db = Database::open(dir.path().join("test.db"))?;
    let models = vec![
        ClassificationModel {
            id: 0,
            code: Some("05".into()),
            name_en: Some("Antioquia".into()),
            level: Some("department".into()),
            parent_id: None,
        },
        ClassificationModel {
            id: 1,
            code: Some("05001".into()),
            name_en: Some("Medellin".into()),
            level: Some("municipality".into()),
            parent_id: Some(0),
        },
    ];
    db.add_all(ModelTable::Location, &models)?;
    assert_eq!(2, db.count_rows("location")?);
    let rows: Vec<(i64, String, Option<i64>)> = db.block_on(
        sqlx::query_as("SELECT id, code, parent_id FROM location ORDER BY id").fetch_all(db.pool()),
    )?;
    assert_eq!(vec![(0, "05".to_string(), None), (1, "05001".to_string(), Some(0))], rows);
    Ok(())
}

#[test]
fn test_run_import() -> Result<(), ImportError> {
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    let mut config = ImportConfig::default();
    config.database = root.join("atlas.db");
    config.batch_size = NonZeroUsize::new(3).unwrap();
    config.population_years = (1990, 2013);

    config.classifications.product = write_fixture(
        root,
        "hs92_atlas.csv",
        "index,code,name,level,parent_id\n0,0022,Cars,4digit,\n1,0024,Trucks,4digit,\n",
    );
    config.classifications.location = write_fixture(
        root,
        "locations.csv",
        "index,code,name,level,parent_id\n0,10,Antioquia,department,\n1,10001,Medellin,municipality,0\n",
    );
    config.classifications.industry = write_fixture(
        root,
        "isic.csv",
        "index,code,name,level,parent_id\n0,A,Agriculture,section,\n1,0111,Crops,class,0\n",
    );
    config.datasets.trade = write_fixture(
        root,
        "trade.csv",
        "r,p,yr,X_rpy_p,density_natl,eci_natl,pci,coi_natl,cog_natl,RCA_natl,junk\n\
         10,22,1998,1234,1,4,3,1,1,1,x\n\
         10,24,1998,4321,1,4,1,1,1,1,x\n\
         10,22,1999,9999,1,7,3,1,1,1,x\n",
    );
    config.datasets.gdp = write_fixture(
        root,
        "gdp.csv",
        "depcode,depgdpn,gdpkmultipliedbydeflator,year\n10,2.5,2.0,1998\n10,3.0,2.5,1999\n",
    );
    config.datasets.population = write_fixture(
        root,
        "pop.csv",
        "year,dp,popdept\n1998,10,1000\n1999,10,1000\n1985,10,900\n",
    );
    config.datasets.employment_department = write_fixture(
        root,
        "pila_dpto.csv",
        "r,i,year,E_yir,W_yir,rca,density,cog,coi,pci\n\
         10,0111,2010,100,5000,1.2,0.3,0.1,0.2,0.5\n\
         10,.,2010,1,1,1,1,1,1,1\n",
    );
    config.datasets.employment_municipality = write_fixture(
        root,
        "pila_mun.csv",
        "r,i,year,E_yir,W_yir,rca,density,cog,coi,pci\n\
         10001,0111,2010,60,3000,1.1,0.3,0.1,0.2,0.5\n\
         10001,0111,2011,70,3500,1.3,0.4,0.1,0.2,0.6\n\
         99999,0111,2010,5,100,0.1,0.1,0.1,0.1,0.5\n",
    );

    let db = Database::open(&config.database)?;
    run(&db, &config)?;

    for (table, rows) in [
        ("product", 2),
        ("location", 2),
        ("industry", 2),
        ("product_year", 4),
        ("department_year", 2),
        ("department_product_year", 4),
        ("industry_year", 1),
        ("department_industry_year", 1),
        ("municipality_industry_year", 2),
    ] {
        assert_eq!(rows, db.count_rows(table)?, "rows in {}", table);
    }

    let cy: Vec<(i64, i64, f64)> = db.block_on(
        sqlx::query_as("SELECT year, eci, gdp_pc_real FROM department_year ORDER BY year")
            .fetch_all(db.pool()),
    )?;
    assert_eq!(vec![(1998, 4, 2000.0), (1999, 7, 2500.0)], cy);

    let (export_value,): (i64,) = db.block_on(
        sqlx::query_as(
            "SELECT export_value FROM department_product_year \
             WHERE department_id = 0 AND product_id = 0 AND year = 1998",
        )
        .fetch_one(db.pool()),
    )?;
    assert_eq!(1234, export_value);

    let (filled,): (i64,) = db.block_on(
        sqlx::query_as(
            "SELECT COUNT(*) FROM department_product_year WHERE export_value IS NULL",
        )
        .fetch_one(db.pool()),
    )?;
    assert_eq!(1, filled);
    Ok(())
}
