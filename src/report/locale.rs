//! Presentation labels.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Locale {
    #[default]
    #[serde(rename = "pt-BR")]
    PtBr,
    #[serde(rename = "en")]
    En,
}

impl Locale {
    pub fn labels(self) -> &'static Labels {
        match self {
            Locale::PtBr => &PT_BR,
            Locale::En => &EN,
        }
    }
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pt-br" | "pt" | "pt_br" => Ok(Locale::PtBr),
            "en" | "en-us" => Ok(Locale::En),
            other => Err(format!("unknown locale {:?} (expected pt-BR or en)", other)),
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locale::PtBr => write!(f, "pt-BR"),
            Locale::En => write!(f, "en"),
        }
    }
}

/// Column headers and flag literals of one locale
#[derive(Debug)]
pub struct Labels {
    pub name: &'static str,
    pub municipality: &'static str,
    pub typology: &'static str,
    pub gak: &'static str,
    pub settlement: &'static str,
    pub fcu: &'static str,
    pub latitude: &'static str,
    pub longitude: &'static str,
    pub yes: &'static str,
    pub no: &'static str,
}

impl Labels {
    /// Result table headers, in column order
    pub fn columns(&self) -> [&'static str; 6] {
        [
            self.name,
            self.municipality,
            self.typology,
            self.gak,
            self.settlement,
            self.fcu,
        ]
    }

    pub fn flag(&self, value: bool) -> &'static str {
        if value {
            self.yes
        } else {
            self.no
        }
    }
}

static PT_BR: Labels = Labels {
    name: "Nome",
    municipality: "Município",
    typology: "Tipologia Intraurbana",
    gak: "GaK",
    settlement: "Nome FCU",
    fcu: "FCU",
    latitude: "Latitude",
    longitude: "Longitude",
    yes: "Sim",
    no: "Não",
};

static EN: Labels = Labels {
    name: "Name",
    municipality: "Municipality",
    typology: "Typology Code",
    gak: "GaK",
    settlement: "Settlement Name",
    fcu: "FCU",
    latitude: "Latitude",
    longitude: "Longitude",
    yes: "Yes",
    no: "No",
};
