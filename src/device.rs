//! Device handle and per-layer operation surfaces.
//!
//! [`Device`] owns the session; the layer accessors hand out short-lived
//! views that borrow it mutably, so two request/acknowledge cycles can
//! never interleave on one connection.

use std::time::Duration;

use tracing::info;

use crate::protocol::dyscom::{
    DyscomGetAck, DyscomGetKind, DyscomInitAck, DyscomInitParams, DyscomPowerModule,
    DyscomPowerModuleAck, DyscomSys, DyscomSysAck, EnergyState, OperationMode, PowerModuleType,
    PowerState, SysType,
};
use crate::protocol::general::{ExtendedVersionAck, StimStatus, StimStatusAck};
use crate::protocol::low_level::{ChannelConfigAck, LowLevelChannelConfig, LowLevelInit};
use crate::protocol::mid_level::{CurrentDataAck, MidLevelInit, MidLevelUpdate};
use crate::protocol::{Ack, Request, ResultAndError};
use crate::session::{LinkError, Session, DEFAULT_TIMEOUT};
use crate::transport::Transport;

/// Protocol layers a device model implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCapability {
    LowLevel,
    MidLevel,
    Dyscom,
}

/// Battery status snapshot from the dyscom battery query.
#[derive(Debug, Clone, Copy)]
pub struct BatteryStatus {
    pub energy_state: EnergyState,
    pub percentage: u8,
    pub temperature: i8,
    pub current_ma: i32,
    pub voltage_mv: u32,
}

/// Basic identity collected by [`Device::initialize`].
#[derive(Debug, Clone, Default)]
pub struct DeviceInfo {
    pub device_id: Option<String>,
    pub firmware_version: Option<String>,
    pub science_mode_version: Option<String>,
}

/// One stimulation/measurement device behind a transport.
pub struct Device<T: Transport> {
    session: Session<T>,
    capabilities: Vec<DeviceCapability>,
    timeout: Duration,
    info: DeviceInfo,
}

impl<T: Transport> Device<T> {
    /// A device with an explicit capability set.
    pub fn new(transport: T, capabilities: impl Into<Vec<DeviceCapability>>) -> Self {
        Self {
            session: Session::new(transport),
            capabilities: capabilities.into(),
            timeout: DEFAULT_TIMEOUT,
            info: DeviceInfo::default(),
        }
    }

    /// A P24 stimulator: low level and mid level.
    pub fn p24(transport: T) -> Self {
        Self::new(transport, [DeviceCapability::LowLevel, DeviceCapability::MidLevel])
    }

    /// An I24 biosignal recorder: dyscom.
    pub fn i24(transport: T) -> Self {
        Self::new(transport, [DeviceCapability::Dyscom])
    }

    pub fn has_capability(&self, capability: DeviceCapability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Acknowledgement timeout used by all layer operations.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Identity collected by [`initialize`](Self::initialize).
    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    pub fn session(&mut self) -> &mut Session<T> {
        &mut self.session
    }

    /// Open the transport.
    pub fn open(&mut self) -> Result<(), LinkError> {
        self.session.open()
    }

    /// Close the transport.
    pub fn close(&mut self) {
        self.session.close();
    }

    /// Bring the device into a known state and fetch its identity.
    ///
    /// Stops any stimulation or measurement left over from a previous
    /// session, then queries serial number and versions.
    pub async fn initialize(&mut self) -> Result<(), LinkError> {
        if self.has_capability(DeviceCapability::LowLevel)
            && self.has_capability(DeviceCapability::MidLevel)
        {
            let status = self.general().get_stim_status().await?;
            match status.stim_status {
                StimStatus::LowLevel => self.low_level().stop().await?,
                StimStatus::MidLevelInitialized | StimStatus::MidLevelRunning => {
                    self.mid_level().stop().await?
                }
                StimStatus::NoLevel => {}
            }
        }
        if self.has_capability(DeviceCapability::Dyscom) {
            let mode = self.dyscom().get_operation_mode().await?;
            if mode != OperationMode::Idle {
                self.dyscom().stop().await?;
            }
        }

        let device_id = self.general().get_device_id().await?;
        let version = self.general().get_extended_version().await?;
        info!(
            device_id = %device_id,
            firmware = %version.firmware_version,
            protocol = %version.science_mode_version,
            "device initialized"
        );
        self.info = DeviceInfo {
            device_id: Some(device_id),
            firmware_version: Some(version.firmware_version),
            science_mode_version: Some(version.science_mode_version),
        };
        Ok(())
    }

    /// General layer: identity, status, reset.
    pub fn general(&mut self) -> GeneralLayer<'_, T> {
        GeneralLayer { session: &mut self.session, timeout: self.timeout }
    }

    /// Low level layer: host-timed per-pulse stimulation.
    pub fn low_level(&mut self) -> LowLevelLayer<'_, T> {
        LowLevelLayer { session: &mut self.session, timeout: self.timeout }
    }

    /// Mid level layer: device-timed repeating stimulation.
    pub fn mid_level(&mut self) -> MidLevelLayer<'_, T> {
        MidLevelLayer { session: &mut self.session, timeout: self.timeout }
    }

    /// Dyscom layer: biosignal measurement and file retrieval.
    pub fn dyscom(&mut self) -> DyscomLayer<'_, T> {
        DyscomLayer { session: &mut self.session, timeout: self.timeout }
    }
}

fn check_result(
    operation: &'static str,
    code: ResultAndError,
) -> Result<(), LinkError> {
    if code.is_error() {
        Err(LinkError::CommandFailed { operation, code })
    } else {
        Ok(())
    }
}

fn unexpected(command: u16) -> LinkError {
    LinkError::UnexpectedAck { command }
}

// ---------------------------------------------------------------------------
// General layer
// ---------------------------------------------------------------------------

/// Borrowed view for general-layer operations.
pub struct GeneralLayer<'a, T: Transport> {
    session: &'a mut Session<T>,
    timeout: Duration,
}

impl<T: Transport> GeneralLayer<'_, T> {
    /// Query the 10-character device serial.
    pub async fn get_device_id(&mut self) -> Result<String, LinkError> {
        let request = Request::GetDeviceId;
        match self.session.send_and_wait(&request, self.timeout).await? {
            Ack::GetDeviceIdAck(ack) => {
                check_result("GetDeviceId", ack.result)?;
                Ok(ack.device_id)
            }
            _ => Err(unexpected(request.command())),
        }
    }

    /// Query firmware and protocol versions.
    pub async fn get_extended_version(&mut self) -> Result<ExtendedVersionAck, LinkError> {
        let request = Request::GetExtendedVersion;
        match self.session.send_and_wait(&request, self.timeout).await? {
            Ack::GetExtendedVersionAck(ack) => {
                check_result("GetExtendedVersion", ack.result)?;
                Ok(ack)
            }
            _ => Err(unexpected(request.command())),
        }
    }

    /// Query overall stimulation state.
    pub async fn get_stim_status(&mut self) -> Result<StimStatusAck, LinkError> {
        let request = Request::GetStimStatus;
        match self.session.send_and_wait(&request, self.timeout).await? {
            Ack::GetStimStatusAck(ack) => {
                check_result("GetStimStatus", ack.result)?;
                Ok(ack)
            }
            _ => Err(unexpected(request.command())),
        }
    }

    /// Reboot the device.
    pub async fn reset(&mut self) -> Result<(), LinkError> {
        let request = Request::Reset;
        match self.session.send_and_wait(&request, self.timeout).await? {
            Ack::ResetAck(code) => check_result("Reset", code),
            _ => Err(unexpected(request.command())),
        }
    }
}

// ---------------------------------------------------------------------------
// Low level layer
// ---------------------------------------------------------------------------

/// Borrowed view for low-level stimulation.
pub struct LowLevelLayer<'a, T: Transport> {
    session: &'a mut Session<T>,
    timeout: Duration,
}

impl<T: Transport> LowLevelLayer<'_, T> {
    pub async fn init(&mut self, params: LowLevelInit) -> Result<(), LinkError> {
        info!(mode = ?params.mode, "low level init");
        let request = Request::LowLevelInit(params);
        match self.session.send_and_wait(&request, self.timeout).await? {
            Ack::LowLevelInitAck(code) => check_result("LowLevelInit", code),
            _ => Err(unexpected(request.command())),
        }
    }

    /// Send one pulse configuration and wait for its acknowledgement.
    pub async fn channel_config(
        &mut self,
        config: LowLevelChannelConfig,
    ) -> Result<ChannelConfigAck, LinkError> {
        let request = Request::LowLevelChannelConfig(config);
        match self.session.send_and_wait(&request, self.timeout).await? {
            Ack::LowLevelChannelConfigAck(ack) => {
                check_result("LowLevelChannelConfig", ack.result)?;
                Ok(ack)
            }
            _ => Err(unexpected(request.command())),
        }
    }

    /// Send one pulse configuration without waiting.
    ///
    /// For tight pulse trains where the caller collects acknowledgements
    /// later via [`Session::receive`].
    pub fn send_channel_config(
        &mut self,
        config: LowLevelChannelConfig,
    ) -> Result<u8, LinkError> {
        self.session.send(&Request::LowLevelChannelConfig(config))
    }

    pub async fn stop(&mut self) -> Result<(), LinkError> {
        info!("low level stop");
        let request = Request::LowLevelStop;
        match self.session.send_and_wait(&request, self.timeout).await? {
            Ack::LowLevelStopAck(code) => check_result("LowLevelStop", code),
            _ => Err(unexpected(request.command())),
        }
    }
}

// ---------------------------------------------------------------------------
// Mid level layer
// ---------------------------------------------------------------------------

/// Borrowed view for mid-level stimulation.
pub struct MidLevelLayer<'a, T: Transport> {
    session: &'a mut Session<T>,
    timeout: Duration,
}

impl<T: Transport> MidLevelLayer<'_, T> {
    pub async fn init(&mut self, params: MidLevelInit) -> Result<(), LinkError> {
        info!(stop_on_all_errors = params.stop_on_all_errors, "mid level init");
        let request = Request::MidLevelInit(params);
        match self.session.send_and_wait(&request, self.timeout).await? {
            Ack::MidLevelInitAck(code) => check_result("MidLevelInit", code),
            _ => Err(unexpected(request.command())),
        }
    }

    /// Replace the running channel configuration.
    pub async fn update(&mut self, update: MidLevelUpdate) -> Result<(), LinkError> {
        let request = Request::MidLevelUpdate(update);
        match self.session.send_and_wait(&request, self.timeout).await? {
            Ack::MidLevelUpdateAck(code) => check_result("MidLevelUpdate", code),
            _ => Err(unexpected(request.command())),
        }
    }

    /// Poll stimulation state and per-channel errors. Doubles as the
    /// keep-alive the device expects while mid level is running.
    pub async fn get_current_data(&mut self) -> Result<CurrentDataAck, LinkError> {
        let request = Request::MidLevelGetCurrentData;
        match self.session.send_and_wait(&request, self.timeout).await? {
            Ack::MidLevelGetCurrentDataAck(ack) => {
                check_result("MidLevelGetCurrentData", ack.result)?;
                Ok(ack)
            }
            _ => Err(unexpected(request.command())),
        }
    }

    pub async fn stop(&mut self) -> Result<(), LinkError> {
        info!("mid level stop");
        let request = Request::MidLevelStop;
        match self.session.send_and_wait(&request, self.timeout).await? {
            Ack::MidLevelStopAck(code) => check_result("MidLevelStop", code),
            _ => Err(unexpected(request.command())),
        }
    }
}

// ---------------------------------------------------------------------------
// Dyscom layer
// ---------------------------------------------------------------------------

/// Borrowed view for dyscom measurement operations.
pub struct DyscomLayer<'a, T: Transport> {
    session: &'a mut Session<T>,
    timeout: Duration,
}

impl<T: Transport> DyscomLayer<'_, T> {
    pub async fn init(&mut self, params: DyscomInitParams) -> Result<DyscomInitAck, LinkError> {
        info!(duration_s = params.duration_s, "dyscom init");
        let request = Request::DyscomInit(params);
        match self.session.send_and_wait(&request, self.timeout).await? {
            Ack::DyscomInitAck(ack) => {
                check_result("DyscomInit", ack.result)?;
                Ok(ack)
            }
            _ => Err(unexpected(request.command())),
        }
    }

    /// Start the configured measurement.
    pub async fn start(&mut self) -> Result<(), LinkError> {
        info!("dyscom start");
        let request = Request::DyscomStart;
        match self.session.send_and_wait(&request, self.timeout).await? {
            Ack::DyscomStartAck(code) => check_result("DyscomStart", code),
            _ => Err(unexpected(request.command())),
        }
    }

    pub async fn stop(&mut self) -> Result<(), LinkError> {
        info!("dyscom stop");
        let request = Request::DyscomStop;
        match self.session.send_and_wait(&request, self.timeout).await? {
            Ack::DyscomStopAck(code) => check_result("DyscomStop", code),
            _ => Err(unexpected(request.command())),
        }
    }

    async fn get(&mut self, kind: DyscomGetKind) -> Result<DyscomGetAck, LinkError> {
        let request = Request::DyscomGet(kind);
        match self.session.send_and_wait(&request, self.timeout).await? {
            Ack::DyscomGetAck(ack) if ack.kind() == kind => {
                check_result("DyscomGet", ack.result())?;
                Ok(ack)
            }
            _ => Err(unexpected(request.command())),
        }
    }

    pub async fn get_operation_mode(&mut self) -> Result<OperationMode, LinkError> {
        match self.get(DyscomGetKind::OperationMode).await? {
            DyscomGetAck::OperationMode { operation_mode, .. } => Ok(operation_mode),
            _ => Err(unexpected(crate::commands::DL_GET)),
        }
    }

    pub async fn get_battery_status(&mut self) -> Result<BatteryStatus, LinkError> {
        match self.get(DyscomGetKind::Battery).await? {
            DyscomGetAck::Battery {
                energy_state, percentage, temperature, current, voltage, ..
            } => Ok(BatteryStatus {
                energy_state,
                percentage,
                temperature,
                current_ma: current,
                voltage_mv: voltage,
            }),
            _ => Err(unexpected(crate::commands::DL_GET)),
        }
    }

    pub async fn get_file_system_status(&mut self) -> Result<DyscomGetAck, LinkError> {
        self.get(DyscomGetKind::FileSystemStatus).await
    }

    pub async fn get_list_of_measurement_meta_info(&mut self) -> Result<u16, LinkError> {
        match self.get(DyscomGetKind::ListOfMeasurementMetaInfo).await? {
            DyscomGetAck::ListOfMeasurementMetaInfo { number_of_measurements, .. } => {
                Ok(number_of_measurements)
            }
            _ => Err(unexpected(crate::commands::DL_GET)),
        }
    }

    pub async fn get_device_id(&mut self) -> Result<String, LinkError> {
        match self.get(DyscomGetKind::DeviceId).await? {
            DyscomGetAck::DeviceId { device_id, .. } => Ok(device_id),
            _ => Err(unexpected(crate::commands::DL_GET)),
        }
    }

    pub async fn get_firmware_version(&mut self) -> Result<String, LinkError> {
        match self.get(DyscomGetKind::FirmwareVersion).await? {
            DyscomGetAck::FirmwareVersion { firmware_version, .. } => Ok(firmware_version),
            _ => Err(unexpected(crate::commands::DL_GET)),
        }
    }

    pub async fn get_file_by_name(&mut self) -> Result<DyscomGetAck, LinkError> {
        self.get(DyscomGetKind::FileByName).await
    }

    pub async fn get_file_info(&mut self) -> Result<DyscomGetAck, LinkError> {
        self.get(DyscomGetKind::FileInfo).await
    }

    /// Switch a hardware module on or off.
    pub async fn power_module(
        &mut self,
        module: PowerModuleType,
        power: PowerState,
    ) -> Result<DyscomPowerModuleAck, LinkError> {
        info!(?module, ?power, "dyscom power module");
        let request = Request::DyscomPowerModule(DyscomPowerModule { module, power });
        match self.session.send_and_wait(&request, self.timeout).await? {
            Ack::DyscomPowerModuleAck(ack) => {
                check_result("DyscomPowerModule", ack.result)?;
                Ok(ack)
            }
            _ => Err(unexpected(request.command())),
        }
    }

    /// Run a maintenance operation, e.g. deleting a measurement file.
    pub async fn sys(
        &mut self,
        sys_type: SysType,
        filename: impl Into<String>,
    ) -> Result<DyscomSysAck, LinkError> {
        let request = Request::DyscomSys(DyscomSys { sys_type, filename: filename.into() });
        match self.session.send_and_wait(&request, self.timeout).await? {
            Ack::DyscomSysAck(ack) => {
                check_result("DyscomSys", ack.result)?;
                Ok(ack)
            }
            _ => Err(unexpected(request.command())),
        }
    }

    /// Confirm a received file block. Fire-and-forget; the device does
    /// not acknowledge the confirmation.
    pub fn confirm_file_block(&mut self, block_number: u32) -> Result<(), LinkError> {
        self.session.send(&Request::DyscomSendFileAck { block_number })?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{
        ack_of, DL_SEND_FILE, GET_DEVICE_ID, GET_EXTENDED_VERSION, GET_STIM_STATUS,
        MID_LEVEL_STOP,
    };
    use crate::frame;
    use crate::protocol::dyscom::FileBlock;
    use crate::testing::MockTransport;

    /// Replies to each request the way an idle device would.
    fn scripted_device(wire: &[u8]) -> Vec<u8> {
        let (command, number, payload) = frame::extract(wire).unwrap();
        let reply: Vec<u8> = match command {
            GET_STIM_STATUS => vec![0, 2, 0],
            GET_DEVICE_ID => {
                let mut p = vec![0u8];
                p.extend_from_slice(b"SN0000001\0");
                p
            }
            GET_EXTENDED_VERSION => vec![0, 2, 1, 0, 4, 0, 0, 0, 0, 0, 0, 0, 1],
            crate::commands::DL_GET if payload == [3] => vec![0, 3, 3],
            _ => vec![0],
        };
        frame::encode(ack_of(command), number, &reply)
    }

    #[tokio::test(start_paused = true)]
    async fn initialize_stops_stale_mid_level() {
        let mut device = Device::p24(MockTransport::new());
        device.session().buffer().transport().respond_with(scripted_device);
        device.initialize().await.unwrap();

        assert_eq!(device.info().device_id.as_deref(), Some("SN0000001"));
        assert_eq!(device.info().firmware_version.as_deref(), Some("2.1.0"));

        // stim status, mid level stop, device id, version
        let commands: Vec<u16> = device
            .session()
            .buffer()
            .transport()
            .writes()
            .iter()
            .map(|w| frame::extract(w).unwrap().0)
            .collect();
        assert_eq!(
            commands,
            vec![GET_STIM_STATUS, MID_LEVEL_STOP, GET_DEVICE_ID, GET_EXTENDED_VERSION]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn initialize_stops_running_measurement() {
        let mut device = Device::i24(MockTransport::new());
        device.session().buffer().transport().respond_with(scripted_device);
        device.initialize().await.unwrap();

        let commands: Vec<u16> = device
            .session()
            .buffer()
            .transport()
            .writes()
            .iter()
            .map(|w| frame::extract(w).unwrap().0)
            .collect();
        // operation mode reported LiveMeasuring, so a stop is issued
        assert_eq!(
            commands,
            vec![
                crate::commands::DL_GET,
                crate::commands::DL_STOP,
                GET_DEVICE_ID,
                GET_EXTENDED_VERSION
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn command_failure_surfaces_result_code() {
        let mut device = Device::p24(MockTransport::new());
        device.session().buffer().transport().respond_with(|wire| {
            let (command, number, _) = frame::extract(wire).unwrap();
            frame::encode(ack_of(command), number, &[7])
        });
        let err = device.mid_level().stop().await.unwrap_err();
        match err {
            LinkError::CommandFailed { operation, code } => {
                assert_eq!(operation, "MidLevelStop");
                assert_eq!(code, ResultAndError::NotInitialized);
            }
            other => panic!("wrong error {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn file_blocks_surface_between_requests() {
        let mut device = Device::i24(MockTransport::new());
        let mut push = Vec::new();
        push.extend_from_slice(&9u32.to_be_bytes());
        push.extend_from_slice(&3u16.to_be_bytes());
        push.extend_from_slice(&[0x01, 0x02, 0x03]);
        let push_frame = frame::encode(DL_SEND_FILE, 0, &push);
        device.session().buffer().transport().queue_read(&push_frame);

        let env = device.session().receive().unwrap().unwrap();
        match env.ack {
            Ack::DyscomFileBlock(FileBlock { block_number, data }) => {
                assert_eq!(block_number, 9);
                assert_eq!(data, vec![0x01, 0x02, 0x03]);
            }
            other => panic!("wrong packet {other:?}"),
        }
        device.dyscom().confirm_file_block(9).unwrap();
        assert_eq!(device.session().buffer().open_acknowledge_count(), 0);
    }
}
