use geo::Geometry;
use proptest::prelude::*;
use tidysf::{ColumnSpec, ColumnType, Crs, FeatureCollection, Table, Value};

fn points_table(rows: &[(i64, f64, f64)]) -> Table {
    Table::from_rows(
        vec![
            ColumnSpec::new("key", ColumnType::Integer),
            ColumnSpec::new("x", ColumnType::Double),
            ColumnSpec::new("y", ColumnType::Double),
        ],
        rows.iter()
            .map(|(key, x, y)| vec![Value::Integer(*key), Value::Real(*x), Value::Real(*y)])
            .collect(),
    )
    .expect("valid table")
}

fn points(rows: &[(i64, f64, f64)]) -> FeatureCollection {
    FeatureCollection::from_coordinates(&points_table(rows), "x", "y", Crs::Epsg(4326))
        .expect("valid coordinates")
}

fn lookup(keys: &[i64]) -> Table {
    Table::from_rows(
        vec![
            ColumnSpec::new("key", ColumnType::Integer),
            ColumnSpec::new("label", ColumnType::Varchar),
        ],
        keys.iter()
            .enumerate()
            .map(|(i, key)| vec![Value::Integer(*key), Value::Text(format!("r{i}"))])
            .collect(),
    )
    .expect("valid table")
}

fn rows_strategy() -> impl Strategy<Value = Vec<(i64, f64, f64)>> {
    prop::collection::vec((0i64..6, -180.0f64..180.0, -85.0f64..85.0), 0..40)
}

fn aligned(fc: &FeatureCollection) -> bool {
    fc.geometry().len() == fc.nrow() && fc.attributes().nrow() == fc.nrow()
}

fn matches_of(key: i64, right: &[i64]) -> usize {
    right.iter().filter(|k| **k == key).count()
}

proptest! {
    #[test]
    fn geometry_stays_aligned_with_rows(
        rows in rows_strategy(),
        right in prop::collection::vec(0i64..8, 0..10),
        start in 0usize..50,
        len in 0usize..50,
    ) {
        let fc = points(&rows);
        prop_assert!(aligned(&fc));

        let even = fc.filter(|f| matches!(f.get("key"), Some(Value::Integer(k)) if k % 2 == 0));
        prop_assert!(aligned(&even));
        prop_assert!(aligned(&fc.slice(start..start + len)));
        prop_assert!(aligned(&fc.head(len)));
        prop_assert!(aligned(&fc.arrange(&[tidysf::SortKey::desc("key")]).expect("arrange")));
        prop_assert!(aligned(&fc.bind_rows(&even).expect("bind")));

        let right = lookup(&right);
        prop_assert!(aligned(&fc.left_join(&right, "key").expect("left join")));
        prop_assert!(aligned(&fc.inner_join(&right, "key").expect("inner join")));
        prop_assert!(aligned(&fc.semi_join(&right, "key").expect("semi join")));
        prop_assert!(aligned(&fc.anti_join(&right, "key").expect("anti join")));
    }

    #[test]
    fn coordinates_round_trip(rows in rows_strategy()) {
        let fc = points(&rows);
        let table = fc.to_coordinates().expect("points");
        for (i, (_, x, y)) in rows.iter().enumerate() {
            prop_assert_eq!(table.value(i, "X"), Some(&Value::Real(*x)));
            prop_assert_eq!(table.value(i, "Y"), Some(&Value::Real(*y)));
        }
        let back = FeatureCollection::from_coordinates(&table, "X", "Y", Crs::Epsg(4326))
            .expect("valid coordinates");
        prop_assert_eq!(back, fc);
    }

    #[test]
    fn join_row_counts(
        rows in rows_strategy(),
        right_keys in prop::collection::vec(0i64..8, 0..10),
    ) {
        let fc = points(&rows);
        let right = lookup(&right_keys);

        let left_expected: usize = rows.iter().map(|(k, _, _)| matches_of(*k, &right_keys).max(1)).sum();
        let inner_expected: usize = rows.iter().map(|(k, _, _)| matches_of(*k, &right_keys)).sum();
        let semi_expected = rows.iter().filter(|(k, _, _)| matches_of(*k, &right_keys) > 0).count();

        let left = fc.left_join(&right, "key").expect("left join");
        prop_assert_eq!(left.nrow(), left_expected);
        prop_assert!(left.nrow() >= fc.nrow());

        let inner = fc.inner_join(&right, "key").expect("inner join");
        prop_assert_eq!(inner.nrow(), inner_expected);
        for feature in inner.iter() {
            let key = feature.get("key").cloned();
            prop_assert!(rows.iter().any(|(k, _, _)| Some(Value::Integer(*k)) == key));
            prop_assert!(right_keys.iter().any(|k| Some(Value::Integer(*k)) == key));
        }

        let semi = fc.semi_join(&right, "key").expect("semi join");
        let anti = fc.anti_join(&right, "key").expect("anti join");
        prop_assert_eq!(semi.nrow(), semi_expected);
        prop_assert_eq!(semi.nrow() + anti.nrow(), fc.nrow());
    }

    #[test]
    fn same_crs_transform_is_identity(rows in rows_strategy()) {
        let fc = points(&rows);
        prop_assert_eq!(fc.transform(&Crs::Epsg(4326)).expect("identity"), fc.clone());

        let mercator = fc.transform(&Crs::Epsg(3857)).expect("to mercator");
        prop_assert_eq!(mercator.transform(&Crs::Epsg(3857)).expect("identity"), mercator);
    }

    #[test]
    fn mercator_round_trip(rows in rows_strategy()) {
        let fc = points(&rows);
        let back = fc
            .transform(&Crs::Epsg(3857))
            .and_then(|m| m.transform(&Crs::Epsg(4326)))
            .expect("round trip");
        prop_assert_eq!(back.crs(), &Crs::Epsg(4326));
        for (before, after) in fc.geometry().iter().zip(back.geometry().iter()) {
            let (Geometry::Point(before), Geometry::Point(after)) = (before, after) else {
                return Err(TestCaseError::fail("points stay points"));
            };
            prop_assert!(approx::abs_diff_eq!(before.x(), after.x(), epsilon = 1e-9));
            prop_assert!(approx::abs_diff_eq!(before.y(), after.y(), epsilon = 1e-9));
        }
    }
}
