use crate::{HashMap, NamedSignal, SignalRef, SimTime};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub struct VcdWriter {
    writer: BufWriter<File>,
    signal_order: Vec<(SignalRef, String, usize)>,
    last_values: HashMap<SignalRef, u64>,
    timestamp: Option<SimTime>,
}

impl VcdWriter {
    pub fn new<P: AsRef<Path>>(path: P, scope: &str, signals: &[NamedSignal]) -> std::io::Result<Self> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        // VCD Header
        writeln!(writer, "$date")?;
        writeln!(
            writer,
            "  {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        )?;
        writeln!(writer, "$end")?;
        writeln!(writer, "$version")?;
        writeln!(writer, "  pulsebench")?;
        writeln!(writer, "$end")?;
        writeln!(writer, "$timescale 1ps $end")?;

        writeln!(writer, "$scope module {} $end", scope)?;
        let mut signal_order = Vec::with_capacity(signals.len());
        for (index, named) in signals.iter().enumerate() {
            let vcd_id = Self::generate_vcd_id(index);
            writeln!(
                writer,
                "$var wire {} {} {} $end",
                named.width, vcd_id, named.name
            )?;
            signal_order.push((named.signal, vcd_id, named.width));
        }
        writeln!(writer, "$upscope $end")?;

        writeln!(writer, "$enddefinitions $end")?;
        writeln!(writer, "$dumpvars")?;
        writeln!(writer, "$end")?;

        Ok(Self {
            writer,
            signal_order,
            last_values: HashMap::default(),
            timestamp: None,
        })
    }

    fn generate_vcd_id(num: usize) -> String {
        let mut id = String::new();
        let mut n = num;
        loop {
            let char = ((n % 94) + 33) as u8 as char;
            id.push(char);
            if n < 94 {
                break;
            }
            n = (n / 94) - 1;
        }
        id.chars().rev().collect()
    }

    /// Writes every signal whose value differs from the last dump.
    pub fn dump(
        &mut self,
        timestamp: SimTime,
        get_val: impl Fn(SignalRef) -> u64,
    ) -> std::io::Result<()> {
        let mut stamped = self.timestamp == Some(timestamp);
        for (signal, vcd_id, width) in &self.signal_order {
            let current_val = get_val(*signal);
            if self.last_values.get(signal) == Some(&current_val) {
                continue;
            }
            if !stamped {
                writeln!(self.writer, "#{}", timestamp.as_ps())?;
                self.timestamp = Some(timestamp);
                stamped = true;
            }
            if *width == 1 {
                writeln!(self.writer, "{}{}", current_val, vcd_id)?;
            } else {
                writeln!(self.writer, "b{:b} {}", current_val, vcd_id)?;
            }
            self.last_values.insert(*signal, current_val);
        }
        self.writer.flush()?;
        Ok(())
    }
}
