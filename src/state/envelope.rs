// src/state/envelope.rs
//
// Volume automation of a track.

/// One automation point: gain `value` reached at timeline `time` (seconds).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlPoint {
    pub time: f64,
    pub value: f32,
}

impl ControlPoint {
    pub fn new(time: f64, value: f32) -> Self {
        Self { time, value }
    }
}

/// Control points kept sorted by time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Envelope {
    points: Vec<ControlPoint>,
}

impl Envelope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_points(mut points: Vec<ControlPoint>) -> Self {
        points.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { points }
    }

    #[inline]
    pub fn points(&self) -> &[ControlPoint] {
        &self.points
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Insert a point, keeping time order. Returns its index.
    pub fn add(&mut self, point: ControlPoint) -> usize {
        let index = self.points.partition_point(|p| p.time <= point.time);
        self.points.insert(index, point);
        index
    }

    pub fn remove(&mut self, index: usize) -> Option<ControlPoint> {
        (index < self.points.len()).then(|| self.points.remove(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_points_stay_sorted() {
        let mut env = Envelope::from_points(vec![
            ControlPoint::new(4.0, 0.2),
            ControlPoint::new(1.0, 1.0),
        ]);
        assert_eq!(env.add(ControlPoint::new(2.0, 0.5)), 1);
        let times: Vec<_> = env.points().iter().map(|p| p.time).collect();
        assert_eq!(times, vec![1.0, 2.0, 4.0]);

        assert_eq!(env.remove(0), Some(ControlPoint::new(1.0, 1.0)));
        assert_eq!(env.remove(7), None);
    }
}
