use archpol_core::ReservationMethod;

use crate::cli::{OutputFormat, ReservationDecodeArgs, ReservationEncodeArgs};
use crate::output::{ReservationReport, render_reservation};
use crate::state::CliResult;

pub(crate) fn handle_reservation_decode(
    args: &ReservationDecodeArgs,
    format: OutputFormat,
) -> CliResult<()> {
    render_reservation(&report(ReservationMethod::decode(args.code)), format)
}

pub(crate) fn handle_reservation_encode(
    args: &ReservationEncodeArgs,
    format: OutputFormat,
) -> CliResult<()> {
    let method = ReservationMethod::new(args.attribute, args.set, args.fs);
    render_reservation(&report(method), format)
}

fn report(method: ReservationMethod) -> ReservationReport {
    ReservationReport {
        code: method.encode(),
        method: method.to_string(),
        attribute: method.attribute(),
        reserve_set: method.reserve_set(),
        reserve_fs: method.reserve_fs(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_codes_report_no_reservation() {
        let report = report(ReservationMethod::decode(-1));
        assert_eq!(report.code, 0);
        assert_eq!(report.method, "none");
    }

    #[test]
    fn encoded_report_carries_all_bits() {
        let report = report(ReservationMethod::new(0x02, true, true));
        assert_eq!(report.code, 0x32);
        assert!(report.reserve_set && report.reserve_fs);
        assert_eq!(report.attribute, 0x02);
    }
}
