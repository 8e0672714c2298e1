//! Growable polyline of WGS84 points, kept as parallel lat/lon arrays.

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointList {
    lats: Vec<f64>,
    lons: Vec<f64>,
}

impl PointList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            lats: Vec::with_capacity(capacity),
            lons: Vec::with_capacity(capacity),
        }
    }

    pub fn size(&self) -> usize {
        self.lats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lats.is_empty()
    }

    pub fn add(&mut self, lat: f64, lon: f64) {
        self.ensure_room();
        self.lats.push(lat);
        self.lons.push(lon);
    }

    pub fn set(&mut self, index: usize, lat: f64, lon: f64) {
        assert!(index < self.size(), "point index {index} out of bounds");
        self.lats[index] = lat;
        self.lons[index] = lon;
    }

    pub fn latitude(&self, index: usize) -> f64 {
        assert!(index < self.size(), "point index {index} out of bounds");
        self.lats[index]
    }

    pub fn longitude(&self, index: usize) -> f64 {
        assert!(index < self.size(), "point index {index} out of bounds");
        self.lons[index]
    }

    /// Reverse the polyline in place.
    pub fn reverse(&mut self) {
        let len = self.size();
        for i in 0..len / 2 {
            self.lats.swap(i, len - 1 - i);
            self.lons.swap(i, len - 1 - i);
        }
    }

    /// Cut the logical size down to `new_size`.
    pub fn trim_to_size(&mut self, new_size: usize) {
        assert!(
            new_size <= self.size(),
            "cannot trim {} points to {new_size}",
            self.size()
        );
        self.lats.truncate(new_size);
        self.lons.truncate(new_size);
    }

    /// Release spare capacity.
    pub fn shrink_to_fit(&mut self) {
        self.lats.shrink_to_fit();
        self.lons.shrink_to_fit();
    }

    // Grow by half, five slots minimum, like the other record containers.
    fn ensure_room(&mut self) {
        let len = self.lats.len();
        if len == self.lats.capacity() {
            let target = (len * 3 / 2).max(5);
            self.lats.reserve_exact(target - len);
            self.lons.reserve_exact(target - len);
        }
    }
}
