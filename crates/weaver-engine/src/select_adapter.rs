use crate::error::EngineError;

/// Whether this engine instance runs as an EMS (dispatches to a remote ADES)
/// or an ADES (runs steps locally).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Ems,
    Ades,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterKind {
    LocalContainer,
    Wps1,
    ApiProcesses,
}

/// Pure adapter-selection rule: a `WPS1Requirement` hint always wins (it
/// names a specific remote dialect, independent of the engine's own mode);
/// an `ESGF-CWTRequirement` hint is not implemented; otherwise the engine's
/// mode decides between dispatching to a remote ADES (`EMS`) or running the
/// step itself (`ADES`).
pub fn select_adapter(has_wps1_requirement: bool, has_esgf_cwt_requirement: bool, mode: ExecutionMode) -> Result<AdapterKind, EngineError> {
    if has_esgf_cwt_requirement {
        return Err(EngineError::NotImplemented { requirement: "ESGF-CWTRequirement".to_string() });
    }
    if has_wps1_requirement {
        return Ok(AdapterKind::Wps1);
    }
    Ok(match mode {
        ExecutionMode::Ems => AdapterKind::ApiProcesses,
        ExecutionMode::Ades => AdapterKind::LocalContainer,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wps1_requirement_wins_regardless_of_mode() {
        assert_eq!(select_adapter(true, false, ExecutionMode::Ems).unwrap(), AdapterKind::Wps1);
        assert_eq!(select_adapter(true, false, ExecutionMode::Ades).unwrap(), AdapterKind::Wps1);
    }

    #[test]
    fn esgf_cwt_requirement_is_not_implemented() {
        let err = select_adapter(false, true, ExecutionMode::Ems).unwrap_err();
        assert!(matches!(err, EngineError::NotImplemented { .. }));
    }

    #[test]
    fn esgf_cwt_requirement_takes_priority_over_wps1() {
        let err = select_adapter(true, true, ExecutionMode::Ems).unwrap_err();
        assert!(matches!(err, EngineError::NotImplemented { .. }));
    }

    #[test]
    fn mode_decides_absent_any_requirement_hint() {
        assert_eq!(select_adapter(false, false, ExecutionMode::Ems).unwrap(), AdapterKind::ApiProcesses);
        assert_eq!(select_adapter(false, false, ExecutionMode::Ades).unwrap(), AdapterKind::LocalContainer);
    }
}
