//! Assembly of the bike-sales transaction table from its three source tables.

use crate::error::Result;
use crate::table::{Column, Table};
use tracing::debug;

/// Output columns, in order, before `.` is replaced by `_`.
pub const COLLECTED_COLUMNS: [&str; 13] = [
    "order.id",
    "order.line",
    "order.date",
    "quantity",
    "price",
    "total.price",
    "model",
    "category.1",
    "category.2",
    "frame.material",
    "bikeshop.name",
    "city",
    "state",
];

/// Split every cell on `sep` into exactly `parts` columns.
///
/// Cells with fewer pieces leave the trailing columns missing; surplus
/// pieces stay joined in the last column.
fn split_text(cells: &[Option<String>], sep: &str, parts: usize) -> Vec<Vec<Option<String>>> {
    let mut out = vec![Vec::with_capacity(cells.len()); parts];
    for cell in cells {
        let mut pieces: Vec<Option<String>> = match cell {
            Some(s) => s.splitn(parts, sep).map(|p| Some(p.to_string())).collect(),
            None => Vec::new(),
        };
        pieces.resize(parts, None);
        for (column, piece) in out.iter_mut().zip(pieces) {
            column.push(piece);
        }
    }
    out
}

/// Join order lines with products and customers and derive the sales columns.
///
/// `orderlines.product.id` matches `bikes.bike.id` and
/// `orderlines.customer.id` matches `bikeshops.bikeshop.id`, both as left
/// joins. The result keeps [`COLLECTED_COLUMNS`] with `.` renamed to `_`.
pub fn collect_data(orderlines: &Table, bikes: &Table, bikeshops: &Table) -> Result<Table> {
    let mut df = orderlines
        .left_join(bikes, "product.id", "bike.id")?
        .left_join(bikeshops, "customer.id", "bikeshop.id")?;

    let dates = df.timestamps("order.date")?;
    df.insert("order.date", Column::Timestamp(dates))?;

    let [cat1, cat2, material]: [Vec<Option<String>>; 3] =
        split_text(df.texts("description")?, " - ", 3)
            .try_into()
            .unwrap_or_else(|_| Default::default());
    df.insert("category.1", Column::Text(cat1))?;
    df.insert("category.2", Column::Text(cat2))?;
    df.insert("frame.material", Column::Text(material))?;

    let [city, state]: [Vec<Option<String>>; 2] = split_text(df.texts("location")?, ", ", 2)
        .try_into()
        .unwrap_or_else(|_| Default::default());
    df.insert("city", Column::Text(city))?;
    df.insert("state", Column::Text(state))?;

    let total: Vec<Option<f64>> = df
        .floats("quantity")?
        .iter()
        .zip(df.floats("price")?)
        .map(|(q, p)| q.zip(*p).map(|(q, p)| q * p))
        .collect();
    df.insert("total.price", Column::Float(total))?;

    let out = df
        .select(&COLLECTED_COLUMNS)?
        .rename_with(|name| name.replace('.', "_"));
    debug!(rows = out.n_rows(), columns = out.n_columns(), "collected order lines");
    Ok(out)
}
