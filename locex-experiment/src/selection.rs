use locex_core::SphericalCoordinate;

/// The participant's current pick and, in training, the revealed answer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionModel {
    selection: Option<SphericalCoordinate>,
    highlight: Option<SphericalCoordinate>,
}

impl SelectionModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the current pick. Non-finite coordinates are ignored.
    pub fn set_selection(&mut self, coord: SphericalCoordinate) -> bool {
        if !coord.is_finite() {
            return false;
        }
        self.selection = Some(SphericalCoordinate::new(coord.azimuth, coord.elevation));
        true
    }

    /// Shows the ground truth. Only once per trial, and only after a pick.
    pub fn reveal(&mut self, ground_truth: SphericalCoordinate) -> bool {
        if self.selection.is_none() || self.highlight.is_some() {
            return false;
        }
        self.highlight = Some(ground_truth);
        true
    }

    pub fn selection(&self) -> Option<SphericalCoordinate> {
        self.selection
    }

    pub fn highlight(&self) -> Option<SphericalCoordinate> {
        self.highlight
    }

    pub fn clear(&mut self) {
        self.selection = None;
        self.highlight = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reveal_requires_a_pick() {
        let mut model = SelectionModel::new();
        assert!(!model.reveal(SphericalCoordinate::ORIGIN));
        assert_eq!(model.highlight(), None);
    }

    #[test]
    fn reveal_happens_once() {
        let mut model = SelectionModel::new();
        model.set_selection(SphericalCoordinate::new(90.0, 0.0));
        assert!(model.reveal(SphericalCoordinate::new(45.0, 15.0)));
        assert!(!model.reveal(SphericalCoordinate::new(180.0, 0.0)));
        assert_eq!(model.highlight(), Some(SphericalCoordinate::new(45.0, 15.0)));
    }

    #[test]
    fn selection_is_normalized_and_replaced() {
        let mut model = SelectionModel::new();
        model.set_selection(SphericalCoordinate { azimuth: -90.0, elevation: 0.0 });
        assert_eq!(model.selection(), Some(SphericalCoordinate::new(270.0, 0.0)));
        model.set_selection(SphericalCoordinate::new(10.0, 10.0));
        assert_eq!(model.selection(), Some(SphericalCoordinate::new(10.0, 10.0)));
        assert!(!model.set_selection(SphericalCoordinate { azimuth: f32::NAN, elevation: 0.0 }));
        assert_eq!(model.selection(), Some(SphericalCoordinate::new(10.0, 10.0)));
    }

    #[test]
    fn clear_drops_both() {
        let mut model = SelectionModel::new();
        model.set_selection(SphericalCoordinate::ORIGIN);
        model.reveal(SphericalCoordinate::ORIGIN);
        model.clear();
        assert_eq!(model, SelectionModel::default());
    }
}
