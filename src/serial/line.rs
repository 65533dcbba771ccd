// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::{
    fs::{File, OpenOptions},
    io::{self, Read},
    os::unix::{
        fs::{FileTypeExt, MetadataExt, OpenOptionsExt},
        io::AsRawFd,
    },
    path::Path,
};

use nix::{
    fcntl::{fcntl, FcntlArg, Flock, FlockArg, OFlag},
    sys::termios::{
        self, ControlFlags, InputFlags, LocalFlags, OutputFlags, SetArg, SpecialCharacterIndices,
        Termios,
    },
};

use super::settings::{BaudRate, DataBits, DeviceSettings, Parity, StopBits};

nix::ioctl_none_bad!(tiocexcl, nix::libc::TIOCEXCL);
nix::ioctl_none_bad!(tiocnxcl, nix::libc::TIOCNXCL);

/// An open device descriptor, as seen by a [`super::SerialPort`].
pub trait Line: Send {
    /// Returns the number of hard links to the device node.
    fn link_count(&self) -> io::Result<u64>;

    /// Reads whatever the committed VMIN/VTIME policy yields. Zero means the timer expired.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Applies the settings to the line discipline in one step.
    fn commit(&mut self, settings: &DeviceSettings) -> io::Result<()>;
}

/// A real terminal device opened exclusively.
pub struct Tty {
    file: Flock<File>,
}

impl Tty {
    /// Opens the device without making it our controlling terminal and takes an
    /// exclusive lock on it.
    pub fn open(path: &Path) -> io::Result<Tty> {
        // O_NONBLOCK keeps open() from waiting on carrier detect. It is cleared on commit.
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags((OFlag::O_NOCTTY | OFlag::O_NONBLOCK).bits())
            .open(path)?;

        if !file.metadata()?.file_type().is_char_device() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "not a character device",
            ));
        }

        let file = Flock::lock(file, FlockArg::LockExclusiveNonblock)
            .map_err(|(_, errno)| io::Error::from(errno))?;
        // SAFETY: the descriptor is owned by `file` and open for the duration of the call.
        unsafe { tiocexcl(file.as_raw_fd()) }.map_err(io::Error::from)?;

        Ok(Tty { file })
    }
}

impl Line for Tty {
    fn link_count(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.nlink())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (&*self.file).read(buf)
    }

    fn commit(&mut self, settings: &DeviceSettings) -> io::Result<()> {
        let mut attributes = termios::tcgetattr(&*self.file)?;
        apply(settings, &mut attributes)?;
        termios::tcsetattr(&*self.file, SetArg::TCSANOW, &attributes)?;

        // Back to blocking reads so VMIN/VTIME govern how long a read waits.
        fcntl(self.file.as_raw_fd(), FcntlArg::F_SETFL(OFlag::empty()))?;
        Ok(())
    }
}

impl Drop for Tty {
    fn drop(&mut self) {
        // SAFETY: the descriptor is still owned by `self.file` here.
        let _ = unsafe { tiocnxcl(self.file.as_raw_fd()) };
    }
}

fn speed(baud_rate: BaudRate) -> termios::BaudRate {
    match baud_rate {
        BaudRate::B50 => termios::BaudRate::B50,
        BaudRate::B75 => termios::BaudRate::B75,
        BaudRate::B110 => termios::BaudRate::B110,
        BaudRate::B134 => termios::BaudRate::B134,
        BaudRate::B150 => termios::BaudRate::B150,
        BaudRate::B200 => termios::BaudRate::B200,
        BaudRate::B300 => termios::BaudRate::B300,
        BaudRate::B600 => termios::BaudRate::B600,
        BaudRate::B1200 => termios::BaudRate::B1200,
        BaudRate::B1800 => termios::BaudRate::B1800,
        BaudRate::B2400 => termios::BaudRate::B2400,
        BaudRate::B4800 => termios::BaudRate::B4800,
        BaudRate::B9600 => termios::BaudRate::B9600,
        BaudRate::B19200 => termios::BaudRate::B19200,
        BaudRate::B38400 => termios::BaudRate::B38400,
        BaudRate::B57600 => termios::BaudRate::B57600,
        BaudRate::B115200 => termios::BaudRate::B115200,
        BaudRate::B230400 => termios::BaudRate::B230400,
    }
}

/// Overlays the settings onto a termios control block, leaving it in raw mode.
///
/// Every flag this touches is cleared before it is set, so applying the same settings
/// twice produces the same block.
pub(super) fn apply(settings: &DeviceSettings, attributes: &mut Termios) -> nix::Result<()> {
    let speed = speed(settings.baud_rate());
    termios::cfsetispeed(attributes, speed)?;
    termios::cfsetospeed(attributes, speed)?;

    attributes.local_flags &= !(LocalFlags::ICANON
        | LocalFlags::ECHO
        | LocalFlags::ECHOE
        | LocalFlags::ISIG
        | LocalFlags::IEXTEN);

    attributes.input_flags &= !(InputFlags::ICRNL
        | InputFlags::INLCR
        | InputFlags::IGNCR
        | InputFlags::ISTRIP
        | InputFlags::IXON
        | InputFlags::IXOFF
        | InputFlags::IXANY);
    if settings.software_flow_control() {
        attributes.input_flags |= InputFlags::IXON | InputFlags::IXOFF | InputFlags::IXANY;
    }

    attributes
        .output_flags
        .set(OutputFlags::OPOST, settings.process_output());

    attributes.control_flags &= !(ControlFlags::CSIZE
        | ControlFlags::CSTOPB
        | ControlFlags::PARENB
        | ControlFlags::PARODD
        | ControlFlags::CRTSCTS);
    attributes.control_flags |= ControlFlags::CREAD | ControlFlags::CLOCAL;
    attributes.control_flags |= match settings.data_bits() {
        DataBits::Five => ControlFlags::CS5,
        DataBits::Six => ControlFlags::CS6,
        DataBits::Seven => ControlFlags::CS7,
        DataBits::Eight => ControlFlags::CS8,
    };
    if settings.stop_bits() == StopBits::Two {
        attributes.control_flags |= ControlFlags::CSTOPB;
    }
    match settings.parity() {
        Parity::None => {}
        Parity::Even => attributes.control_flags |= ControlFlags::PARENB,
        Parity::Odd => attributes.control_flags |= ControlFlags::PARENB | ControlFlags::PARODD,
    }
    if settings.hardware_flow_control() {
        attributes.control_flags |= ControlFlags::CRTSCTS;
    }

    attributes.control_chars[SpecialCharacterIndices::VMIN as usize] =
        settings.minimum_read_bytes();
    attributes.control_chars[SpecialCharacterIndices::VTIME as usize] =
        settings.read_timeout_deciseconds();

    Ok(())
}
