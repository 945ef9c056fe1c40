use crate::types::{FeatureRow, FeatureTable, Granule, OceanError, OceanResult};
use std::sync::Arc;

/// Flattens granules into rows of the shared feature table
#[derive(Debug, Clone)]
pub struct FeatureAssembler {
    columns: Vec<String>,
}

impl FeatureAssembler {
    /// Create an assembler for the given scalar columns
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Empty table with this assembler's schema
    pub fn empty_table(&self) -> FeatureTable {
        FeatureTable::new(self.columns.clone())
    }

    /// Flatten one granule in row-major order.
    ///
    /// Every cell becomes a row, NaN cells included, tagged with the
    /// granule identifier. A column or navigation grid whose shape differs
    /// from the band cube's spatial shape is a shape mismatch.
    pub fn flatten(&self, granule: &Granule) -> OceanResult<FeatureTable> {
        let (rows, cols) = granule.spatial_dim();
        log::debug!(
            "Flattening granule {} ({}x{} cells, {} columns)",
            granule.identifier,
            rows,
            cols,
            self.columns.len()
        );

        let fields = self
            .columns
            .iter()
            .map(|name| granule.scalar(name))
            .collect::<OceanResult<Vec<_>>>()?;

        let navigation = [
            ("latitude", &granule.coordinates.latitude),
            ("longitude", &granule.coordinates.longitude),
        ];
        let grids = navigation
            .into_iter()
            .chain(self.columns.iter().map(String::as_str).zip(fields.iter().copied()));
        for (name, grid) in grids {
            if grid.dim() != (rows, cols) {
                return Err(OceanError::ShapeMismatch {
                    context: format!("{} of granule {}", name, granule.identifier),
                    expected: (rows, cols),
                    found: grid.dim(),
                });
            }
        }

        let source: Arc<str> = Arc::from(granule.identifier.as_str());
        let latitude = &granule.coordinates.latitude;
        let longitude = &granule.coordinates.longitude;

        let mut table = self.empty_table();
        table.rows.reserve(rows * cols);

        for ((r, c), &lat) in latitude.indexed_iter() {
            table.rows.push(FeatureRow {
                latitude: lat,
                longitude: longitude[[r, c]],
                values: fields.iter().map(|field| field[[r, c]]).collect(),
                source_granule: Arc::clone(&source),
            });
        }

        Ok(table)
    }

    /// Flatten several granules into one table, in the order given
    pub fn flatten_many<'a, I>(&self, granules: I) -> OceanResult<FeatureTable>
    where
        I: IntoIterator<Item = &'a Granule>,
    {
        let mut table = self.empty_table();
        for granule in granules {
            table.append(self.flatten(granule)?)?;
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BandCube, CoordinateGrid, Field, Wavelengths};
    use ndarray::array;
    use std::collections::BTreeMap;

    fn granule(id: &str, offset: f32) -> Granule {
        let mut scalars = BTreeMap::new();
        scalars.insert("nflh".to_string(), array![[1.0, 2.0], [3.0, f32::NAN]] + offset);
        scalars.insert("avw".to_string(), array![[500.0, 510.0], [520.0, 530.0]]);

        Granule {
            identifier: id.to_string(),
            acquisition_order: 0,
            acquired_at: None,
            band_cube: BandCube::zeros((2, 2, 4)),
            wavelengths: Wavelengths::from(vec![443.0, 490.0, 510.0, 555.0]),
            coordinates: CoordinateGrid::new(
                array![[10.0, 10.0], [11.0, 11.0]],
                array![[-70.0, -69.0], [-70.0, -69.0]],
            )
            .unwrap(),
            derived_scalars: scalars,
        }
    }

    #[test]
    fn test_flatten_row_major_and_keeps_nan() {
        let assembler = FeatureAssembler::new(vec!["nflh".to_string(), "avw".to_string()]);
        let table = assembler.flatten(&granule("A", 0.0)).unwrap();

        assert_eq!(table.len(), 4);
        assert_eq!(table.rows[1].latitude, 10.0);
        assert_eq!(table.rows[1].longitude, -69.0);
        assert_eq!(table.rows[1].values, vec![2.0, 510.0]);
        assert!(table.rows[3].values[0].is_nan());
        assert!(table.rows.iter().all(|r| &*r.source_granule == "A"));
    }

    #[test]
    fn test_missing_column_is_error() {
        let assembler = FeatureAssembler::new(vec!["oc4".to_string()]);
        let result = assembler.flatten(&granule("A", 0.0));
        assert!(matches!(result, Err(OceanError::InvalidFormat(_))));
    }

    #[test]
    fn test_flatten_many_preserves_granule_order() {
        let assembler = FeatureAssembler::new(vec!["nflh".to_string()]);
        let granules = vec![granule("B", 10.0), granule("A", 0.0)];
        let table = assembler.flatten_many(&granules).unwrap();

        assert_eq!(table.len(), 8);
        assert_eq!(&*table.rows[0].source_granule, "B");
        assert_eq!(&*table.rows[4].source_granule, "A");
        assert_eq!(table.rows_for("A").count(), 4);
        assert_eq!(table.column("nflh").unwrap()[0], 11.0);
    }

    #[test]
    fn test_field_off_grid_is_shape_mismatch() {
        let assembler = FeatureAssembler::new(vec!["nflh".to_string()]);
        let mut g = granule("A", 0.0);
        g.derived_scalars.insert("nflh".to_string(), Field::zeros((1, 1)));

        let result = assembler.flatten(&g);
        assert!(matches!(
            result,
            Err(OceanError::ShapeMismatch { expected: (2, 2), found: (1, 1), .. })
        ));
    }

    #[test]
    fn test_coordinates_off_grid_is_shape_mismatch() {
        let assembler = FeatureAssembler::new(vec!["avw".to_string()]);
        let mut g = granule("A", 0.0);
        g.coordinates = CoordinateGrid::new(Field::zeros((3, 2)), Field::zeros((3, 2))).unwrap();

        assert!(matches!(
            assembler.flatten(&g),
            Err(OceanError::ShapeMismatch { found: (3, 2), .. })
        ));
    }

    #[test]
    fn test_empty_grid() {
        let assembler = FeatureAssembler::new(vec!["nflh".to_string()]);
        let mut g = granule("A", 0.0);
        g.band_cube = BandCube::zeros((0, 0, 4));
        g.coordinates = CoordinateGrid::new(Field::zeros((0, 0)), Field::zeros((0, 0))).unwrap();
        g.derived_scalars.insert("nflh".to_string(), Field::zeros((0, 0)));

        let table = assembler.flatten(&g).unwrap();
        assert!(table.is_empty());
    }
}
