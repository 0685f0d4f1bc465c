use crate::classification::{Classification, ID_COLUMN};
use crate::error::Result;

/// Destination table of a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTable {
    Product,
    Location,
    Industry,
}

impl ModelTable {
    pub fn table_name(&self) -> &'static str {
        match self {
            ModelTable::Product => "product",
            ModelTable::Location => "location",
            ModelTable::Industry => "industry",
        }
    }
}

impl std::fmt::Display for ModelTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table_name())
    }
}

/// One classification entry as stored for the web application.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClassificationModel {
    pub id: i64,
    pub code: Option<String>,
    pub name_en: Option<String>,
    pub level: Option<String>,
    pub parent_id: Option<i64>,
}

fn owned(value: Option<&str>) -> Option<String> {
    value.map(str::to_string)
}

/// One model per classification row; NaN parents become `None`.
pub fn classification_to_models(classification: &Classification) -> Result<Vec<ClassificationModel>> {
    let table = classification.table();
    let ids = table.column(ID_COLUMN)?.i64()?;
    let codes = table.column("code")?.str()?;
    let names = table.column("name")?.str()?;
    let levels = table.column("level")?.str()?;
    let parents = table.column("parent_id")?.f64()?;

    let mut models = Vec::with_capacity(table.height());
    for i in 0..table.height() {
        let Some(id) = ids.get(i) else {
            continue;
        };
        models.push(ClassificationModel {
            id,
            code: owned(codes.get(i)),
            name_en: owned(names.get(i)),
            level: owned(levels.get(i)),
            parent_id: parents.get(i).filter(|p| !p.is_nan()).map(|p| p as i64),
        });
    }
    Ok(models)
}
