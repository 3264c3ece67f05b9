// ============================================================================
// TOOL CONTROLS — typed descriptors bound to accessor functions
// ============================================================================

use crate::error::ControlError;

/// One user-adjustable setting of a `T` (usually a tool's property struct).
pub enum Control<T> {
    Slider {
        name: &'static str,
        min: f32,
        max: f32,
        step: f32,
        get: fn(&T) -> f32,
        set: fn(&mut T, f32),
    },
    Checkbox {
        name: &'static str,
        get: fn(&T) -> bool,
        set: fn(&mut T, bool),
    },
    Toggle {
        name: &'static str,
        options: &'static [&'static str],
        get: fn(&T) -> usize,
        set: fn(&mut T, usize),
    },
}

impl<T> Control<T> {
    pub fn name(&self) -> &'static str {
        match self {
            Control::Slider { name, .. } | Control::Checkbox { name, .. } | Control::Toggle { name, .. } => name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Control::Slider { .. } => "slider",
            Control::Checkbox { .. } => "checkbox",
            Control::Toggle { .. } => "toggle",
        }
    }

    fn validate(&self, index: usize) -> Result<(), ControlError> {
        if self.name().trim().is_empty() {
            return Err(ControlError::MissingName { index });
        }
        match self {
            Control::Slider { name, min, max, step, .. } => {
                let ok = min.is_finite() && max.is_finite() && min < max && *step > 0.0 && step.is_finite();
                if !ok {
                    return Err(ControlError::InvalidRange {
                        name: name.to_string(),
                        min: *min,
                        max: *max,
                        step: *step,
                    });
                }
            }
            Control::Toggle { name, options, .. } if options.is_empty() => {
                return Err(ControlError::NoOptions(name.to_string()));
            }
            _ => {}
        }
        Ok(())
    }
}

/// A validated list of controls. Construction fails on the first malformed
/// descriptor, so a bad tool setup is caught when the tool is built.
pub struct ControlSet<T> {
    controls: Vec<Control<T>>,
}

impl<T> ControlSet<T> {
    pub fn new(controls: Vec<Control<T>>) -> Result<Self, ControlError> {
        for (index, control) in controls.iter().enumerate() {
            control.validate(index)?;
            if controls[..index].iter().any(|c| c.name() == control.name()) {
                return Err(ControlError::DuplicateName(control.name().to_string()));
            }
        }
        Ok(Self { controls })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Control<T>> {
        self.controls.iter()
    }

    pub fn len(&self) -> usize {
        self.controls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Control<T>> {
        self.controls.iter().find(|c| c.name() == name)
    }

    fn find(&self, name: &str) -> Result<&Control<T>, ControlError> {
        self.get(name).ok_or_else(|| ControlError::UnknownControl(name.to_string()))
    }

    fn wrong_kind(control: &Control<T>, expected: &'static str) -> ControlError {
        ControlError::WrongKind {
            name: control.name().to_string(),
            expected,
            actual: control.kind(),
        }
    }

    /// Set a slider, clamped to its range and snapped to its step. Returns
    /// the value actually stored.
    pub fn set_slider(&self, target: &mut T, name: &str, value: f32) -> Result<f32, ControlError> {
        match self.find(name)? {
            Control::Slider { min, max, step, set, .. } => {
                let snapped = min + ((value - min) / step).round() * step;
                let v = snapped.clamp(*min, *max);
                set(target, v);
                Ok(v)
            }
            other => Err(Self::wrong_kind(other, "slider")),
        }
    }

    pub fn slider_value(&self, target: &T, name: &str) -> Result<f32, ControlError> {
        match self.find(name)? {
            Control::Slider { get, .. } => Ok(get(target)),
            other => Err(Self::wrong_kind(other, "slider")),
        }
    }

    pub fn set_checkbox(&self, target: &mut T, name: &str, value: bool) -> Result<(), ControlError> {
        match self.find(name)? {
            Control::Checkbox { set, .. } => {
                set(target, value);
                Ok(())
            }
            other => Err(Self::wrong_kind(other, "checkbox")),
        }
    }

    pub fn checkbox_value(&self, target: &T, name: &str) -> Result<bool, ControlError> {
        match self.find(name)? {
            Control::Checkbox { get, .. } => Ok(get(target)),
            other => Err(Self::wrong_kind(other, "checkbox")),
        }
    }

    /// Select a toggle option; out-of-range indices pick the last option.
    pub fn set_toggle(&self, target: &mut T, name: &str, index: usize) -> Result<usize, ControlError> {
        match self.find(name)? {
            Control::Toggle { options, set, .. } => {
                let i = index.min(options.len() - 1);
                set(target, i);
                Ok(i)
            }
            other => Err(Self::wrong_kind(other, "toggle")),
        }
    }

    pub fn toggle_value(&self, target: &T, name: &str) -> Result<usize, ControlError> {
        match self.find(name)? {
            Control::Toggle { get, .. } => Ok(get(target)),
            other => Err(Self::wrong_kind(other, "toggle")),
        }
    }
}
