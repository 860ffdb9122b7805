use std::path::PathBuf;
use std::rc::Rc;

use anyhow::Context;

use crate::loader::TableCache;
use crate::models::{CoordinatorTable, TotalsTable};

pub const DEFAULT_COORDINATORS_PATH: &str = "Relatório dos Coordenador de Polo - Dir Escolas.xlsx";
pub const DEFAULT_TOTALS_PATH: &str = "GRE_Polo_Turma_Escola.xlsx";

/// Where the two spreadsheets live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSources {
    pub coordinators: PathBuf,
    pub sheet: String,
    pub totals: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Tables {
    pub coordinators: Rc<CoordinatorTable>,
    pub totals: Rc<TotalsTable>,
}

impl DataSources {
    pub fn load(&self, cache: &mut TableCache) -> anyhow::Result<Tables> {
        let coordinators = cache
            .coordinators(&self.coordinators, &self.sheet)
            .with_context(|| {
                format!(
                    "failed to load coordinator table from {}",
                    self.coordinators.display()
                )
            })?;
        let totals = cache
            .totals(&self.totals)
            .with_context(|| format!("failed to load totals table from {}", self.totals.display()))?;

        Ok(Tables {
            coordinators,
            totals,
        })
    }
}
