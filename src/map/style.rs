//! Layer styles.

use serde::Serialize;

/// matplotlib's tab20, used for categorical fills
pub const TAB20: [&str; 20] = [
    "#1f77b4", "#aec7e8", "#ff7f0e", "#ffbb78", "#2ca02c", "#98df8a", "#d62728", "#ff9896",
    "#9467bd", "#c5b0d5", "#8c564b", "#c49c94", "#e377c2", "#f7b6d2", "#7f7f7f", "#c7c7c7",
    "#bcbd22", "#dbdb8d", "#17becf", "#9edae5",
];

pub const SETTLEMENT_COLOR: &str = "red";
pub const ENTITY_COLOR: &str = "green";
pub const ENTITY_RADIUS: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Category {
    pub value: String,
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerStyle {
    /// Fill chosen by the value of `field`
    Categorical {
        field: &'static str,
        categories: Vec<Category>,
    },
    /// One colour for every feature
    Fixed { color: &'static str },
    /// Circle markers for points, same colour for shapes
    Marker {
        color: &'static str,
        radius: f64,
        fill_opacity: f64,
    },
}

impl LayerStyle {
    /// Categorical style over `values`, coloured in sorted order.
    pub fn categorical<'a>(field: &'static str, values: impl IntoIterator<Item = &'a str>) -> Self {
        let mut values: Vec<&str> = values.into_iter().collect();
        values.sort_unstable();
        values.dedup();

        let categories = values
            .into_iter()
            .enumerate()
            .map(|(i, value)| Category {
                value: value.to_string(),
                color: TAB20[i % TAB20.len()],
            })
            .collect();

        LayerStyle::Categorical { field, categories }
    }

    pub fn entity_marker() -> Self {
        LayerStyle::Marker {
            color: ENTITY_COLOR,
            radius: ENTITY_RADIUS,
            fill_opacity: 1.0,
        }
    }
}
