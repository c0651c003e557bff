use criterion::{criterion_group, criterion_main, Criterion};
use finch_asm::assemble;
use finch_machine::{DeviceConfig, Machine, MemoryFill, Status};

pub fn countdown(c: &mut Criterion) {
    let program = assemble(
        "org 2000h\n\
         mov cx, 1000\n\
         again: dec cx\n\
         jnz again\n\
         hlt\n\
         end",
    )
    .unwrap();

    c.bench_function("countdown 1000", move |b| {
        b.iter(|| {
            let mut machine = Machine::new(DeviceConfig::SwitchesAndLeds);
            machine.load_program(&program, MemoryFill::Clean);
            let mut now = 0;
            loop {
                if machine.step(now).unwrap() != Status::Running {
                    break;
                }
                now += 250;
            }
            assert_eq!(machine.status(), Status::Halted);
        })
    });
}

criterion_group!(benches, countdown);
criterion_main!(benches);
