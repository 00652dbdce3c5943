use argh::FromArgs;
use cropnet::{
    crop::{CropConfig, CropLayer, ExecutionStrategy},
    graph::{
        ops::{Filter, TransposedFilter},
        Graph,
    },
    tensor::{Blob, Tensor},
};

/// Crops an upsampled score map back onto its input image
#[derive(Debug, FromArgs)]
struct Args {
    /// input height
    #[argh(option, default = "24")]
    height: usize,

    /// input width
    #[argh(option, default = "32")]
    width: usize,

    /// padding of the first convolution
    #[argh(option, short = 'p', default = "100")]
    pad: usize,

    /// number of score channels
    #[argh(option, short = 'c', default = "21")]
    channels: usize,

    /// run the kernels on the current thread only
    #[argh(switch, short = 's')]
    serial: bool,
}

// output extents of the three layers, with ceil rounding for pooling
fn score_extent(input: usize, pad: usize) -> Option<usize> {
    let conv = (input + 2 * pad).checked_sub(2)?;
    let pool = conv.checked_sub(2)?.div_ceil(2) + 1;
    Some(2 * (pool - 1) + 4)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let mut graph = Graph::new();
    let data = graph.add_input("data");
    let conv = graph.add_layer("conv", &[data], Filter::new(3, 1, args.pad))?;
    let pool = graph.add_layer("pool", &[conv], Filter::new(2, 2, 0))?;
    let upscore = graph.add_layer("upscore", &[pool], TransposedFilter::new(4, 2, 0))?;

    let score_h = score_extent(args.height, args.pad).ok_or("input too small")?;
    let score_w = score_extent(args.width, args.pad).ok_or("input too small")?;
    log::info!("score map {score_h}x{score_w} for input {}x{}", args.height, args.width);

    let image = Blob::<f32>::zeros(vec![1, 3, args.height, args.width]);
    let mut score = Blob::from_tensor(Tensor::from_shape_fn(
        vec![1, args.channels, score_h, score_w],
        |idx| (idx[2] * score_w + idx[3]) as f32,
    ));
    let mut top = Blob::zeros(vec![0]);

    let strategy = match args.serial {
        true => ExecutionStrategy::Serial,
        false => ExecutionStrategy::Parallel,
    };
    let mut layer = CropLayer::new(CropConfig {
        strategy,
        ..Default::default()
    });

    let plan = layer.setup(&graph, &[upscore, data], &[&score, &image])?;
    println!("crop offsets: {:?}", plan.offsets());

    layer.reshape(&[&score, &image], &mut top)?;
    println!("output shape: {:?}", top.shape());

    let start = std::time::Instant::now();
    layer.forward(&[&score, &image], &mut top)?;
    println!("forward took {:?}", start.elapsed());
    if let Some(&first) = top.data().first() {
        let first = first as usize;
        println!("first output element is score[{}, {}]", first / score_w, first % score_w);
    }

    top.diff_mut().fill(1.0);
    let mut image = image;
    let start = std::time::Instant::now();
    layer.backward(&top, &[true, false], &mut [&mut score, &mut image])?;
    println!("backward took {:?}", start.elapsed());

    let touched = score.diff().iter().filter(|&&x| x != 0.0).count();
    println!("gradient reaches {touched} of {} score elements", score.count());

    Ok(())
}
