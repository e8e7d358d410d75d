pub type Point<T = f64> = geo_types::Point<T>;
